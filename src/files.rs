use indexmap::IndexMap;
use serde::Serialize;

/// Tree of uploaded files, keyed by form field name
pub type FileTree = IndexMap<String, FileNode>;

/// A node of the uploaded files tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FileNode {
    File(FileUpload),
    Tree(FileTree),
}

impl FileNode {
    pub fn as_file(&self) -> Option<&FileUpload> {
        match self {
            FileNode::File(file) => Some(file),
            FileNode::Tree(_) => None,
        }
    }

    pub fn as_tree(&self) -> Option<&FileTree> {
        match self {
            FileNode::File(_) => None,
            FileNode::Tree(tree) => Some(tree),
        }
    }
}

/// Upload status as reported by the host environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UploadError {
    Ok,
    IniSize,
    FormSize,
    Partial,
    NoFile,
    NoTmpDir,
    CantWrite,
    Extension,
    Unknown(i64),
}

impl From<i64> for UploadError {
    fn from(code: i64) -> Self {
        match code {
            0 => UploadError::Ok,
            1 => UploadError::IniSize,
            2 => UploadError::FormSize,
            3 => UploadError::Partial,
            4 => UploadError::NoFile,
            6 => UploadError::NoTmpDir,
            7 => UploadError::CantWrite,
            8 => UploadError::Extension,
            code => UploadError::Unknown(code),
        }
    }
}

/// Descriptor of a single uploaded file
///
/// Only the data supplied by the host environment is kept, nothing here touches the file system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileUpload {
    pub(crate) name: String,
    pub(crate) content_type: Option<String>,
    pub(crate) size: u64,
    pub(crate) temporary_file: String,
    pub(crate) error: UploadError,
}

impl FileUpload {
    pub fn new(
        name: impl Into<String>,
        content_type: Option<String>,
        size: u64,
        temporary_file: impl Into<String>,
        error: UploadError,
    ) -> Self {
        Self {
            name: name.into(),
            content_type,
            size,
            temporary_file: temporary_file.into(),
            error,
        }
    }

    /// File name as sent by the browser, do not trust it
    pub fn untrusted_name(&self) -> &str {
        &self.name
    }

    /// Content type declared by the client
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn temporary_file(&self) -> &str {
        &self.temporary_file
    }

    pub fn error(&self) -> UploadError {
        self.error
    }

    pub fn is_ok(&self) -> bool {
        self.error == UploadError::Ok
    }

    pub fn has_file(&self) -> bool {
        self.error != UploadError::NoFile
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes() {
        assert_eq!(UploadError::from(0), UploadError::Ok);
        assert_eq!(UploadError::from(4), UploadError::NoFile);
        assert_eq!(UploadError::from(5), UploadError::Unknown(5));
    }

    #[test]
    fn upload_status() {
        let file = FileUpload::new("a.txt", None, 3, "/tmp/php1", UploadError::Partial);

        assert!(!file.is_ok());
        assert!(file.has_file());
        assert_eq!(file.untrusted_name(), "a.txt");
    }
}
