//! reqwest-backed [`Transport`].

use std::time::Duration;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Url};
use tracing::trace;

use crate::progress::ProgressReporter;
use crate::request::{Attachment, RequestBody, UploadRequest};
use crate::transport::{Reply, Transport, TransportFuture};
use crate::{STREAM_CHUNK_SIZE, TransferError};

/// HTTP transport for the upload API.
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport with an optional whole-request timeout.
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransferError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("osvup/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
        })
    }

    async fn send(
        &self,
        request: UploadRequest,
        progress: ProgressReporter,
    ) -> Result<Reply, TransferError> {
        let url = Url::parse(&request.url)
            .map_err(|e| TransferError::InvalidUrl(format!("{}: {e}", request.url)))?;

        let builder = self.http.post(url);
        let builder = match request.body {
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Multipart { fields, attachment } => {
                builder.multipart(build_form(fields, attachment, progress)?)
            }
        };

        let resp = builder.send().await?;
        let http_status = resp.status().as_u16();
        let bytes = resp.bytes().await?;
        trace!(http_status, len = bytes.len(), "reply received");

        Ok(Reply {
            http_status,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

impl Transport for HttpTransport {
    fn post(&self, request: UploadRequest, progress: ProgressReporter) -> TransportFuture<'_> {
        Box::pin(self.send(request, progress))
    }
}

/// Builds the multipart form. The file part goes first, then the fields.
fn build_form(
    fields: Vec<(String, String)>,
    attachment: Option<Attachment>,
    progress: ProgressReporter,
) -> Result<Form, TransferError> {
    let mut form = Form::new();

    if let Some(file) = attachment {
        let len = file.data.len() as u64;
        let part = Part::stream_with_length(progress_body(file.data, progress), len)
            .file_name(file.file_name)
            .mime_str(&file.content_type)?;
        form = form.part(file.part_name, part);
    }

    for (name, value) in fields {
        form = form.text(name, value);
    }

    Ok(form)
}

/// Streams `data` in fixed slices, advancing `progress` as each slice is
/// handed to the connection.
fn progress_body(data: Vec<u8>, progress: ProgressReporter) -> Body {
    let data = Bytes::from(data);
    let len = data.len();
    let slices = (0..len).step_by(STREAM_CHUNK_SIZE).map(move |start| {
        let slice = data.slice(start..len.min(start + STREAM_CHUNK_SIZE));
        progress.advance(slice.len() as u64);
        Ok::<_, std::io::Error>(slice)
    });
    Body::wrap_stream(futures_util::stream::iter(slices))
}
