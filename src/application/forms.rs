//! Form schemas and their validation.
//!
//! Each form keeps the submitted values so a rejected submission can be
//! re-rendered with the visitor's input and per-field messages.

use std::collections::BTreeMap;

use bytes::Bytes;
use imagesize::ImageType;
use serde::Deserialize;

use crate::domain::error::DomainError;
use crate::domain::users::{validate_password, validate_username};

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_IMAGE: &str = "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const INVALID_GROUP: &str =
    "Select a valid choice. That choice is not one of the available choices.";

/// Field-keyed validation messages. The empty key holds non-field errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<&'static str, Vec<String>>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_default().push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.add("", message);
    }

    pub fn field(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn non_field(&self) -> &[String] {
        self.field("")
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl From<DomainError> for FormErrors {
    fn from(err: DomainError) -> Self {
        let mut errors = FormErrors::new();
        match err {
            DomainError::Validation { field, message } => errors.add(field, message),
            other => errors.add_non_field(other.to_string()),
        }
        errors
    }
}

/// A file part received with a post form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Raw post submission: text, optional group id, optional image.
#[derive(Debug, Clone, Default)]
pub struct PostForm {
    pub text: String,
    pub group: String,
    pub image: Option<ImageUpload>,
    pub clear_image: bool,
}

/// An upload whose bytes decoded as a supported image.
#[derive(Debug, Clone)]
pub struct ValidImage {
    pub filename: String,
    /// File extension derived from the decoded format, never from the filename.
    pub extension: &'static str,
    pub bytes: Bytes,
}

/// What to do with the stored image when a post form is accepted.
#[derive(Debug, Clone)]
pub enum ImageChange {
    Keep,
    Clear,
    Replace(ValidImage),
}

#[derive(Debug, Clone)]
pub struct CleanPost {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: ImageChange,
}

impl PostForm {
    pub fn clean(&self) -> Result<CleanPost, FormErrors> {
        let mut errors = FormErrors::new();

        let text = self.text.trim();
        if text.is_empty() {
            errors.add("text", REQUIRED);
        }

        let group_value = self.group.trim();
        let group_id = if group_value.is_empty() {
            None
        } else {
            match group_value.parse::<i64>() {
                Ok(id) if id > 0 => Some(id),
                _ => {
                    errors.add("group", INVALID_GROUP);
                    None
                }
            }
        };

        let image = match &self.image {
            Some(upload) if !upload.bytes.is_empty() => match image_extension(&upload.bytes) {
                Some(extension) => ImageChange::Replace(ValidImage {
                    filename: upload.filename.clone(),
                    extension,
                    bytes: upload.bytes.clone(),
                }),
                None => {
                    errors.add("image", INVALID_IMAGE);
                    ImageChange::Keep
                }
            },
            _ if self.clear_image => ImageChange::Clear,
            _ => ImageChange::Keep,
        };

        errors.into_result(CleanPost {
            text: text.to_string(),
            group_id,
            image,
        })
    }
}

/// Storage extension for a web raster image whose header decodes to a
/// non-empty canvas. Anything else is not an image.
pub fn image_extension(bytes: &[u8]) -> Option<&'static str> {
    let extension = match imagesize::image_type(bytes).ok()? {
        ImageType::Bmp => "bmp",
        ImageType::Gif => "gif",
        ImageType::Ico => "ico",
        ImageType::Jpeg => "jpg",
        ImageType::Png => "png",
        ImageType::Tiff => "tiff",
        ImageType::Webp => "webp",
        _ => return None,
    };
    match imagesize::blob_size(bytes) {
        Ok(size) if size.width > 0 && size.height > 0 => Some(extension),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommentForm {
    pub text: String,
}

impl CommentForm {
    pub fn clean(&self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::new();
        let text = self.text.trim();
        if text.is_empty() {
            errors.add("text", REQUIRED);
        }
        errors.into_result(text.to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignupForm {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Clone)]
pub struct CleanSignup {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl SignupForm {
    pub fn clean(&self) -> Result<CleanSignup, FormErrors> {
        let mut errors = FormErrors::new();
        let username = self.username.trim();

        if let Err(err) = validate_username(username) {
            merge(&mut errors, err);
        }

        let email = self.email.trim();
        if !email.is_empty() && !looks_like_email(email) {
            errors.add("email", "Enter a valid email address.");
        }

        if self.password1.is_empty() {
            errors.add("password1", REQUIRED);
        }
        if self.password2.is_empty() {
            errors.add("password2", REQUIRED);
        }
        if !self.password1.is_empty() && !self.password2.is_empty() {
            if let Err(err) = validate_password(&self.password1, &self.password2) {
                merge(&mut errors, err);
            }
        }

        errors.into_result(CleanSignup {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password: self.password1.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: String,
}

impl LoginForm {
    pub fn clean(&self) -> Result<(String, String), FormErrors> {
        let mut errors = FormErrors::new();
        let username = self.username.trim();
        if username.is_empty() {
            errors.add("username", REQUIRED);
        }
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        errors.into_result((username.to_string(), self.password.clone()))
    }
}

fn merge(errors: &mut FormErrors, err: DomainError) {
    match err {
        DomainError::Validation { field, message } => errors.add(field, message),
        other => errors.add_non_field(other.to_string()),
    }
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.starts_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}
