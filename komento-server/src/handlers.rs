use axum::{
    extract::{Path, Query, State},
    Json,
};
use komento_api::{
    Comment, CommentId, CommentNode, CommentUpdate, ListQuery, NewComment, NewReport, Page,
    Report, ReportId,
};

use crate::{
    extractors::ModeratorAuth,
    moderation::{ThreadBlock, ThreadView},
    service::Service,
    Error,
};

pub async fn find_all_in_hierarchy(
    State(service): State<Service>,
    Path(relation): Path<String>,
) -> Result<Json<Vec<CommentNode>>, Error> {
    // public view: blocked subtrees stay hidden
    Ok(Json(
        service
            .find_all_in_hierarchy(Some(&relation), None, true)
            .await?,
    ))
}

pub async fn find_all_flat(
    State(service): State<Service>,
    Path(relation): Path<String>,
) -> Result<Json<Vec<Comment>>, Error> {
    Ok(Json(service.find_all_flat(Some(&relation)).await?))
}

/// Absence is `null`, not an error; the caller decides what a missing
/// comment means.
pub async fn find_one(
    State(service): State<Service>,
    Path((relation, id)): Path<(String, CommentId)>,
) -> Result<Json<Option<Comment>>, Error> {
    Ok(Json(service.find_one(id, Some(&relation)).await?))
}

pub async fn create(
    State(service): State<Service>,
    Path(relation): Path<String>,
    Json(data): Json<NewComment>,
) -> Result<Json<Comment>, Error> {
    Ok(Json(service.create(&relation, data).await?))
}

pub async fn update(
    State(service): State<Service>,
    Path((relation, id)): Path<(String, CommentId)>,
    Json(data): Json<CommentUpdate>,
) -> Result<Json<Comment>, Error> {
    Ok(Json(service.update(id, &relation, data).await?))
}

pub async fn points_up(
    State(service): State<Service>,
    Path((relation, id)): Path<(String, CommentId)>,
) -> Result<Json<Comment>, Error> {
    Ok(Json(service.points_up(id, &relation).await?))
}

pub async fn report_abuse(
    State(service): State<Service>,
    Path((relation, id)): Path<(String, CommentId)>,
    Json(data): Json<NewReport>,
) -> Result<Json<Report>, Error> {
    Ok(Json(service.report_abuse(id, &relation, data).await?))
}

pub async fn moderation_find_all(
    ModeratorAuth: ModeratorAuth,
    State(service): State<Service>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Comment>>, Error> {
    Ok(Json(service.find_all(query).await?))
}

pub async fn moderation_find_one_and_thread(
    ModeratorAuth: ModeratorAuth,
    State(service): State<Service>,
    Path(id): Path<CommentId>,
) -> Result<Json<ThreadView>, Error> {
    Ok(Json(service.find_one_and_thread(id).await?))
}

pub async fn moderation_block_comment(
    ModeratorAuth: ModeratorAuth,
    State(service): State<Service>,
    Path(id): Path<CommentId>,
) -> Result<Json<Comment>, Error> {
    Ok(Json(service.block_comment(id).await?))
}

pub async fn moderation_block_thread(
    ModeratorAuth: ModeratorAuth,
    State(service): State<Service>,
    Path(id): Path<CommentId>,
) -> Result<Json<ThreadBlock>, Error> {
    Ok(Json(service.block_comment_thread(id).await?))
}

pub async fn moderation_resolve_report(
    ModeratorAuth: ModeratorAuth,
    State(service): State<Service>,
    Path((report, comment)): Path<(ReportId, CommentId)>,
) -> Result<Json<Report>, Error> {
    Ok(Json(service.resolve_abuse_report(report, comment).await?))
}
