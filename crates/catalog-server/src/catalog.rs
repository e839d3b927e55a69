//! Read-side assembly: records joined with their parent summaries, and the
//! nested course documents.
//!
//! Every fan-out below issues one future per child and awaits them together
//! with `try_join_all`, so each parent's children keep their query order and
//! a single failure fails the whole document.

use std::sync::Arc;

use catalog_store::{
    Course, CourseMedia, CourseSummary, Database, ResourceOrder, Section, SectionRef,
    SectionSummary, Subsection, SubsectionRef, SubsectionResource,
};
use futures::future::try_join_all;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::ApiResult;

pub type SharedDb = Arc<Mutex<Database>>;

#[derive(Debug, Serialize)]
pub struct SectionView {
    #[serde(flatten)]
    pub section: Section,
    pub course: Option<CourseSummary>,
}

#[derive(Debug, Serialize)]
pub struct MediaView {
    #[serde(flatten)]
    pub media: CourseMedia,
    pub course: Option<CourseSummary>,
}

#[derive(Debug, Serialize)]
pub struct SubsectionView {
    #[serde(flatten)]
    pub subsection: Subsection,
    pub course: Option<CourseSummary>,
    pub section: Option<SectionSummary>,
    /// Attached by the read endpoints, omitted on writes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<SubsectionResource>>,
}

#[derive(Debug, Serialize)]
pub struct ResourceView {
    #[serde(flatten)]
    pub resource: SubsectionResource,
    pub course: Option<CourseSummary>,
    pub section: Option<SectionRef>,
    pub subsection: Option<SubsectionRef>,
}

/// A course as listed: sections one level deep, plus media.
#[derive(Debug, Serialize)]
pub struct CourseListing {
    #[serde(flatten)]
    pub course: Course,
    pub sections: Vec<Section>,
    pub media: Vec<CourseMedia>,
}

/// A single course with the full section, subsection and resource tree.
#[derive(Debug, Serialize)]
pub struct CourseTree {
    #[serde(flatten)]
    pub course: Course,
    pub sections: Vec<SectionTree>,
    pub media: Vec<CourseMedia>,
}

#[derive(Debug, Serialize)]
pub struct SectionTree {
    #[serde(flatten)]
    pub section: Section,
    pub subsections: Vec<SubsectionTree>,
}

#[derive(Debug, Serialize)]
pub struct SubsectionTree {
    #[serde(flatten)]
    pub subsection: Subsection,
    pub resources: Vec<SubsectionResource>,
}

pub async fn section_view(db: &SharedDb, section: Section) -> ApiResult<SectionView> {
    let course = db.lock().await.course_summary(section.course_id)?;
    Ok(SectionView { section, course })
}

pub async fn media_view(db: &SharedDb, media: CourseMedia) -> ApiResult<MediaView> {
    let course = db.lock().await.course_summary(media.course_id)?;
    Ok(MediaView { media, course })
}

pub async fn subsection_view(db: &SharedDb, subsection: Subsection) -> ApiResult<SubsectionView> {
    let db = db.lock().await;
    let course = db.course_summary(subsection.course_id)?;
    let section = match subsection.section_id {
        Some(id) => db.section_summary(id)?,
        None => None,
    };
    Ok(SubsectionView {
        subsection,
        course,
        section,
        resources: None,
    })
}

/// Subsection view with its resources, newest first within a sequence.
pub async fn subsection_with_resources(
    db: &SharedDb,
    subsection: Subsection,
) -> ApiResult<SubsectionView> {
    let resources = db
        .lock()
        .await
        .resources_for_subsection(subsection.id, ResourceOrder::NewestFirst)?;
    let mut view = subsection_view(db, subsection).await?;
    view.resources = Some(resources);
    Ok(view)
}

pub async fn resource_view(db: &SharedDb, resource: SubsectionResource) -> ApiResult<ResourceView> {
    let db = db.lock().await;
    let course = db.course_summary(resource.course_id)?;
    let section = match resource.section_id {
        Some(id) => db.section_ref(id)?,
        None => None,
    };
    let subsection = db.subsection_ref(resource.subsection_id)?;
    Ok(ResourceView {
        resource,
        course,
        section,
        subsection,
    })
}

pub async fn course_listing(db: &SharedDb, course: Course) -> ApiResult<CourseListing> {
    let id = course.id;
    let (sections, media) = tokio::try_join!(
        async { ApiResult::Ok(db.lock().await.sections_for_course(id)?) },
        async { ApiResult::Ok(db.lock().await.media_for_course(id)?) },
    )?;
    Ok(CourseListing {
        course,
        sections,
        media,
    })
}

pub async fn course_listings(db: &SharedDb, courses: Vec<Course>) -> ApiResult<Vec<CourseListing>> {
    try_join_all(courses.into_iter().map(|c| course_listing(db, c))).await
}

async fn subsection_tree(db: &SharedDb, subsection: Subsection) -> ApiResult<SubsectionTree> {
    let resources = db
        .lock()
        .await
        .resources_for_subsection(subsection.id, ResourceOrder::OldestFirst)?;
    Ok(SubsectionTree {
        subsection,
        resources,
    })
}

async fn section_tree(db: &SharedDb, section: Section) -> ApiResult<SectionTree> {
    let subsections = db.lock().await.subsections_for_section(section.id)?;
    let subsections = try_join_all(subsections.into_iter().map(|s| subsection_tree(db, s))).await?;
    Ok(SectionTree {
        section,
        subsections,
    })
}

pub async fn course_tree(db: &SharedDb, course: Course) -> ApiResult<CourseTree> {
    let id = course.id;
    let (sections, media) = tokio::try_join!(
        async {
            let sections = db.lock().await.sections_for_course(id)?;
            ApiResult::Ok(try_join_all(sections.into_iter().map(|s| section_tree(db, s))).await?)
        },
        async { ApiResult::Ok(db.lock().await.media_for_course(id)?) },
    )?;
    Ok(CourseTree {
        course,
        sections,
        media,
    })
}

pub async fn section_views(db: &SharedDb, sections: Vec<Section>) -> ApiResult<Vec<SectionView>> {
    try_join_all(sections.into_iter().map(|s| section_view(db, s))).await
}

pub async fn media_views(db: &SharedDb, media: Vec<CourseMedia>) -> ApiResult<Vec<MediaView>> {
    try_join_all(media.into_iter().map(|m| media_view(db, m))).await
}

pub async fn subsection_views_with_resources(
    db: &SharedDb,
    subsections: Vec<Subsection>,
) -> ApiResult<Vec<SubsectionView>> {
    try_join_all(subsections.into_iter().map(|s| subsection_with_resources(db, s))).await
}

pub async fn resource_views(
    db: &SharedDb,
    resources: Vec<SubsectionResource>,
) -> ApiResult<Vec<ResourceView>> {
    try_join_all(resources.into_iter().map(|r| resource_view(db, r))).await
}
