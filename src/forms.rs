use std::io::ErrorKind;
use std::path::Path;

use axum::extract::Multipart;
use bytes::Bytes;
use image::ImageFormat;
use rusqlite::Connection;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::db::groups;
use crate::db::posts::PostInput;
use crate::error::AppResult;

/// Subdirectory of the media root that holds post images.
pub const IMAGE_DIR: &str = "posts";

const INVALID_IMAGE: &str =
    "upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// How many suffixed names to try before giving up on a clashing upload.
const MAX_NAME_ATTEMPTS: usize = 8;

/// Raw post form as submitted, before validation.
#[derive(Debug, Clone, Default)]
pub struct PostForm {
    pub text: String,
    pub group: String,
    pub image: Option<UploadedImage>,
}

/// A file part as the browser sent it. Neither the name nor the declared
/// content type is trusted.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub data: Bytes,
}

/// An upload whose bytes decoded as an image of `format`.
#[derive(Debug, Clone)]
pub struct CheckedImage {
    pub upload: UploadedImage,
    pub format: ImageFormat,
}

/// A post form that passed validation. The image still has to be written to
/// disk before the post row is saved.
#[derive(Debug, Clone)]
pub struct ValidPostForm {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<CheckedImage>,
}

impl PostForm {
    pub async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = PostForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "text" => form.text = field.text().await?,
                "group" => form.group = field.text().await?,
                "image" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let data = field.bytes().await?;
                    // An untouched file input still sends an empty part
                    if !file_name.is_empty() {
                        form.image = Some(UploadedImage { file_name, data });
                    }
                }
                _ => {}
            }
        }

        Ok(form)
    }

    /// Group id the form currently selects, for re-rendering the select box.
    pub fn selected_group(&self) -> Option<i64> {
        self.group.trim().parse().ok()
    }

    pub fn validate(self, conn: &Connection) -> AppResult<Result<ValidPostForm, Vec<String>>> {
        let mut errors = Vec::new();

        let text = self.text.trim().to_string();
        if text.is_empty() {
            errors.push("Text: this field is required.".to_string());
        }

        let group_raw = self.group.trim();
        let group_id = if group_raw.is_empty() {
            None
        } else {
            let found = match group_raw.parse::<i64>() {
                Ok(id) => groups::find_by_id(conn, id)?.map(|g| g.id),
                Err(_) => None,
            };
            if found.is_none() {
                errors.push("Group: select a valid choice.".to_string());
            }
            found
        };

        let image = match self.image {
            Some(upload) => match upload.check() {
                Ok(format) => Some(CheckedImage { upload, format }),
                Err(e) => {
                    errors.push(format!("Image: {}", e));
                    None
                }
            },
            None => None,
        };

        if !errors.is_empty() {
            return Ok(Err(errors));
        }

        Ok(Ok(ValidPostForm {
            text,
            group_id,
            image,
        }))
    }
}

impl UploadedImage {
    /// Sniff the format from the bytes and decode them fully, so a file only
    /// counts as an image if it actually is one.
    fn check(&self) -> Result<ImageFormat, &'static str> {
        if self.data.is_empty() {
            return Err("the submitted file is empty.");
        }

        let format = image::guess_format(&self.data).map_err(|_| INVALID_IMAGE)?;
        image::load_from_memory_with_format(&self.data, format).map_err(|e| {
            tracing::debug!("Rejected {:?} upload {}: {}", format, self.file_name, e);
            INVALID_IMAGE
        })?;

        Ok(format)
    }
}

impl ValidPostForm {
    /// Write the image (if any) under `media_root` and return the post row input.
    pub async fn into_input(self, media_root: &Path) -> AppResult<PostInput> {
        let image = match &self.image {
            Some(checked) => Some(save_image(media_root, checked).await?),
            None => None,
        };
        Ok(PostInput {
            text: self.text,
            group_id: self.group_id,
            image,
        })
    }
}

/// Store an image as `posts/<stem>.<ext>` under the media root, where the
/// extension comes from the detected format. A name that is already taken
/// gets a short random suffix. Returns the relative path.
pub async fn save_image(media_root: &Path, image: &CheckedImage) -> AppResult<String> {
    let dir = media_root.join(IMAGE_DIR);
    tokio::fs::create_dir_all(&dir).await?;

    let stem = file_stem(&image.upload.file_name);
    let ext = format_extension(image.format);

    let mut stored_name = format!("{}.{}", stem, ext);
    let mut attempts = 0;
    let mut file = loop {
        let opened = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dir.join(&stored_name))
            .await;
        match opened {
            Ok(file) => break file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists && attempts < MAX_NAME_ATTEMPTS => {
                attempts += 1;
                stored_name = format!("{}_{}.{}", stem, short_suffix(), ext);
            }
            Err(e) => return Err(e.into()),
        }
    };

    file.write_all(&image.upload.data).await?;
    file.flush().await?;
    tracing::info!(
        "Stored upload {} ({} bytes)",
        stored_name,
        image.upload.data.len()
    );

    Ok(format!("{}/{}", IMAGE_DIR, stored_name))
}

/// Client file name reduced to a safe stem: last path component, extension
/// dropped, anything unusual replaced by `_`.
fn file_stem(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let base = base.rsplit_once('.').map_or(base, |(stem, _)| stem);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

fn format_extension(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpg",
        ImageFormat::Gif => "gif",
        ImageFormat::WebP => "webp",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Ico => "ico",
        ImageFormat::Tiff => "tiff",
        _ => "img",
    }
}

fn short_suffix() -> String {
    uuid::Uuid::now_v7().simple().to_string()[24..].to_string()
}
