use osvup_protocol::Command;

/// Binary file carried by a multipart request.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Multipart part name (`metaData`, `photo`, `video`).
    pub part_name: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("part_name", &self.part_name)
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Body of an upload request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// URL-encoded form fields.
    Form(Vec<(String, String)>),
    /// `multipart/form-data` with named fields and at most one file.
    Multipart {
        fields: Vec<(String, String)>,
        attachment: Option<Attachment>,
    },
}

impl RequestBody {
    pub fn fields(&self) -> &[(String, String)] {
        match self {
            RequestBody::Form(fields) | RequestBody::Multipart { fields, .. } => fields,
        }
    }

    /// Value of the first field called `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields()
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        match self {
            RequestBody::Multipart { attachment, .. } => attachment.as_ref(),
            RequestBody::Form(_) => None,
        }
    }

    fn fields_mut(&mut self) -> &mut Vec<(String, String)> {
        match self {
            RequestBody::Form(fields) | RequestBody::Multipart { fields, .. } => fields,
        }
    }
}

/// One outbound POST. Built fresh for every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub command: Command,
    pub url: String,
    pub body: RequestBody,
}

impl UploadRequest {
    /// Starts a URL-encoded form request.
    pub fn form(command: Command, url: impl Into<String>) -> Self {
        Self {
            command,
            url: url.into(),
            body: RequestBody::Form(Vec::new()),
        }
    }

    /// Starts a multipart request without attachment.
    pub fn multipart(command: Command, url: impl Into<String>) -> Self {
        Self {
            command,
            url: url.into(),
            body: RequestBody::Multipart {
                fields: Vec::new(),
                attachment: None,
            },
        }
    }

    /// Appends a named field.
    pub fn field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.body
            .fields_mut()
            .push((name.to_string(), value.into()));
        self
    }

    /// Sets the binary attachment. Ignored for form requests.
    pub fn attachment(mut self, file: Attachment) -> Self {
        if let RequestBody::Multipart { attachment, .. } = &mut self.body {
            *attachment = Some(file);
        }
        self
    }
}
