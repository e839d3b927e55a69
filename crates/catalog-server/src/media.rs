//! Where a media row's `link` comes from.
//!
//! Course media, subsections and subsection resources all carry a `type`
//! and a `link`. The type decides the source of the link: an uploaded
//! file, a URL in the body, or a video id in the body. The resolver only
//! plans the change; the upload is written by [`LinkPlan::commit`] once
//! every other check has passed.

use catalog_shared::MediaType;
use thiserror::Error;

use crate::error::ApiError;
use crate::uploads::{UploadError, UploadStore, UploadedFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSource {
    FileUpload,
    ExternalLink,
    VideoId,
}

impl From<MediaType> for LinkSource {
    fn from(ty: MediaType) -> Self {
        match ty {
            MediaType::Image | MediaType::Video | MediaType::Pdf | MediaType::Document => {
                LinkSource::FileUpload
            }
            MediaType::Link => LinkSource::ExternalLink,
            MediaType::VideoId => LinkSource::VideoId,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("File is required for type: {0}")]
    MissingFile(MediaType),

    #[error("Link is required for LINK type")]
    MissingLink,

    #[error("Video ID is required for VIDEOID type")]
    MissingVideoId,
}

impl From<LinkError> for ApiError {
    fn from(err: LinkError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

/// The link-bearing parts of a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkInput<'a> {
    pub link: Option<&'a str>,
    pub video_id: Option<&'a str>,
    pub file: Option<&'a UploadedFile>,
}

#[derive(Debug)]
pub enum LinkPlan<'a> {
    /// Leave the stored link alone.
    Keep,
    Set(String),
    Upload(&'a UploadedFile),
}

fn filled(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Resolve the link of a new row of type `ty`.
pub fn resolve_for_create<'a>(ty: MediaType, input: LinkInput<'a>) -> Result<LinkPlan<'a>, LinkError> {
    match LinkSource::from(ty) {
        LinkSource::FileUpload => input
            .file
            .map(LinkPlan::Upload)
            .ok_or(LinkError::MissingFile(ty)),
        LinkSource::ExternalLink => filled(input.link)
            .map(|link| LinkPlan::Set(link.to_string()))
            .ok_or(LinkError::MissingLink),
        LinkSource::VideoId => filled(input.video_id)
            .map(|id| LinkPlan::Set(id.to_string()))
            .ok_or(LinkError::MissingVideoId),
    }
}

/// Resolve the link of an existing row currently stored as `stored`.
///
/// A type change re-runs the create rules for the new type. Without one,
/// a newly attached file replaces the link of file-kind rows and everything
/// else keeps the stored link.
pub fn resolve_for_update<'a>(
    stored: MediaType,
    requested: Option<MediaType>,
    input: LinkInput<'a>,
) -> Result<LinkPlan<'a>, LinkError> {
    match requested {
        Some(ty) if ty != stored => resolve_for_create(ty, input),
        _ => match input.file {
            Some(file) if stored.is_file() => Ok(LinkPlan::Upload(file)),
            _ => Ok(LinkPlan::Keep),
        },
    }
}

impl LinkPlan<'_> {
    /// Write any pending upload and return the new link, `None` for [`LinkPlan::Keep`].
    pub async fn commit(self, uploads: &UploadStore) -> Result<Option<String>, UploadError> {
        match self {
            LinkPlan::Keep => Ok(None),
            LinkPlan::Set(link) => Ok(Some(link)),
            LinkPlan::Upload(file) => uploads.save(file).await.map(Some),
        }
    }
}
