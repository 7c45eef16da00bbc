use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde_json::Value;

use crate::catalog::Catalog;
use crate::error::Rejection;
use crate::format::RequestFormat;
use crate::request::form::parse_form;
use crate::request::job::JobRequest;
use crate::request::parse_request;
use crate::request::schema::RequestSchema;

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Can't read job request at {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Rejected(#[from] Rejection),
}

/// A job request waiting on disk
pub struct Message {
    pub path: PathBuf,
    pub format: RequestFormat,
}

impl Message {
    pub fn read<C: Catalog + ?Sized>(&self, schema: &RequestSchema, catalog: &C) -> Result<JobRequest, MessageError> {
        let body = self.read_file()?;
        let json = match self.format {
            RequestFormat::Json => parse_untyped_json(&body)?,
            RequestFormat::Form => parse_form(body.trim(), catalog),
        };

        match parse_request(schema, json) {
            Ok(request) => {
                info!("Message is valid");
                Ok(request)
            }
            Err(err) => {
                warn!("Message fails validation");
                Err(err.into())
            }
        }
    }

    fn read_file(&self) -> Result<String, MessageError> {
        let path: &Path = self.path.as_path();
        info!("Reading message at {}", path.display());
        fs::read_to_string(path).map_err(|source| {
            warn!("Can't read job request at path {}: {}", path.display(), source);
            MessageError::Read { path: self.path.clone(), source }
        })
    }
}

fn parse_untyped_json(body: &str) -> Result<Value, Rejection> {
    info!("Parsing JSON into untyped structure");
    serde_json::from_str::<Value>(body)
        .map_err(|err| Rejection::malformed(format!("Job request is not valid JSON: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::error::RejectionKind;
    use std::io::Write;

    fn message(body: &str, format: RequestFormat) -> (tempfile::NamedTempFile, Message) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        let message = Message { path: file.path().to_path_buf(), format };
        (file, message)
    }

    #[test]
    fn test_read_json_message() {
        let (_file, message) = message(r#"{ "name": "wc", "appId": "wc-1.0", "nodeCount": 2 }"#, RequestFormat::Json);
        let request = message.read(&RequestSchema::load().unwrap(), &StaticCatalog::default()).unwrap();
        assert_eq!(request.name, "wc");
    }

    #[test]
    fn test_read_form_message() {
        let (_file, message) = message("name=wc&appId=wc-1.0&threads=4\n", RequestFormat::Form);
        let request = message.read(&RequestSchema::load().unwrap(), &StaticCatalog::default()).unwrap();
        assert_eq!(request.parameters["threads"], "4");
    }

    #[test]
    fn test_bad_json_is_malformed() {
        let (_file, message) = message("{ not json", RequestFormat::Json);
        let err = message.read(&RequestSchema::load().unwrap(), &StaticCatalog::default()).unwrap_err();
        assert!(matches!(err, MessageError::Rejected(r) if r.kind() == RejectionKind::MalformedRequest));
    }

    #[test]
    fn test_missing_file() {
        let message = Message { path: PathBuf::from("/nonexistent/request.json"), format: RequestFormat::Json };
        let err = message.read(&RequestSchema::load().unwrap(), &StaticCatalog::default()).unwrap_err();
        assert!(matches!(err, MessageError::Read { .. }));
    }
}
