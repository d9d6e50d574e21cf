//! Multipart form reading shared by the upload routes

use std::collections::HashMap;
use std::str::FromStr;
use axum::extract::Multipart;
use uuid::Uuid;
use crate::services::documents::UploadedFile;
use crate::utils::errors::{VisaPilotError, Result};

/// Text fields and the single file part of an upload form
#[derive(Debug, Default)]
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub file: Option<UploadedFile>,
}

impl UploadForm {
    /// Drain a multipart body. The part named `file` is the upload; any other
    /// part is read as text.
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await.map_err(invalid_form)? {
            let name = field.name().unwrap_or_default().to_string();

            if name == "file" {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(invalid_form)?;
                form.file = Some(UploadedFile { file_name, content_type, bytes: bytes.to_vec() });
            } else {
                let value = field.text().await.map_err(invalid_form)?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// Non-blank text field
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    pub fn uuid(&self, name: &str) -> Result<Option<Uuid>> {
        self.parse(name)
    }

    pub fn required_uuid(&self, name: &str) -> Result<Uuid> {
        self.uuid(name)?
            .ok_or_else(|| VisaPilotError::InvalidInput(format!("{} is required", name)))
    }

    pub fn parse<T: FromStr>(&self, name: &str) -> Result<Option<T>> {
        self.text(name)
            .map(|value| {
                value.parse::<T>()
                    .map_err(|_| VisaPilotError::InvalidInput(format!("{} is invalid", name)))
            })
            .transpose()
    }

    pub fn take_file(&mut self) -> Result<UploadedFile> {
        self.file.take()
            .ok_or_else(|| VisaPilotError::InvalidInput("A file is required".to_string()))
    }
}

fn invalid_form(error: axum::extract::multipart::MultipartError) -> VisaPilotError {
    VisaPilotError::InvalidInput(format!("Invalid upload form: {}", error.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> UploadForm {
        UploadForm {
            fields: pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            file: None,
        }
    }

    #[test]
    fn test_field_accessors() {
        let id = Uuid::new_v4();
        let id_text = id.to_string();
        let form = form(&[("case_id", &id_text), ("title", "  "), ("amount", "1500"), ("bad", "x")]);

        assert_eq!(form.required_uuid("case_id").unwrap(), id);
        assert_eq!(form.text("title"), None);
        assert_eq!(form.parse::<i64>("amount").unwrap(), Some(1500));
        assert!(form.parse::<i64>("bad").is_err());
        assert!(form.required_uuid("checklist_item_id").is_err());
        assert_eq!(form.uuid("checklist_item_id").unwrap(), None);
    }

    #[test]
    fn test_missing_file() {
        let mut form = form(&[]);
        assert!(matches!(form.take_file(), Err(VisaPilotError::InvalidInput(_))));
    }
}
