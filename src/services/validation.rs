//! Request-shape validation
//!
//! Pure local checks run before any network call. A failure here never
//! touches the cache or the network.

use crate::error::{ClientError, Result};
use crate::models::FileUpload;

// == Limits ==
/// MIME types accepted for post images and profile pictures
pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/jpg", "image/gif"];

/// Largest single image, 5 MiB
pub const MAX_IMAGE_SIZE: usize = 5 * 1024 * 1024;

/// Largest combined upload for one post, 10 MiB
pub const MAX_POST_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Most images one post may carry
pub const MAX_POST_IMAGES: usize = 5;

/// Returns the trimmed value, or a validation error if it is blank.
pub fn require_text<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ClientError::validation(field, format!("{} is required", field)));
    }
    Ok(trimmed)
}

/// Minimal shape check: one `@` with a non-empty local part and a dotted domain.
pub fn validate_email(email: &str) -> Result<()> {
    let email = require_text("email", email)?;
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid {
        return Err(ClientError::validation("email", "Invalid email address"));
    }
    Ok(())
}

/// Checks one image's type and size. `label` names it in the message.
pub fn validate_image(field: &str, label: &str, file: &FileUpload) -> Result<()> {
    if file.data.is_empty() {
        return Err(ClientError::validation(field, format!("{} is empty", label)));
    }
    if !ALLOWED_IMAGE_TYPES.contains(&file.content_type.as_str()) {
        return Err(ClientError::validation(
            field,
            format!(
                "{} has invalid type. Please upload JPEG, PNG, or GIF images only.",
                label
            ),
        ));
    }
    if file.size() > MAX_IMAGE_SIZE {
        return Err(ClientError::validation(
            field,
            format!("{} is too large. Maximum size is 5MB.", label),
        ));
    }
    Ok(())
}

/// Checks a post's images: 1 to 5 in total counting `kept` existing ones,
/// each a valid image, new uploads within the combined size limit.
pub fn validate_post_images(images: &[FileUpload], kept: usize) -> Result<()> {
    let total = images.len() + kept;
    if total == 0 {
        return Err(ClientError::validation(
            "images",
            "At least one image is required",
        ));
    }
    if total > MAX_POST_IMAGES {
        return Err(ClientError::validation(
            "images",
            format!("You can only upload up to {} images", MAX_POST_IMAGES),
        ));
    }

    for (index, image) in images.iter().enumerate() {
        validate_image("images", &format!("Image {}", index + 1), image)?;
    }

    let upload_size: usize = images.iter().map(FileUpload::size).sum();
    if upload_size > MAX_POST_UPLOAD_SIZE {
        return Err(ClientError::validation(
            "images",
            "Total image size should be less than 10MB",
        ));
    }
    Ok(())
}

pub fn validate_profile_picture(file: &FileUpload) -> Result<()> {
    validate_image("image", "Profile picture", file)
}
