//! OpenAPI schema registry

use utoipa::OpenApi;

use crate::handlers::archive_upload::ArchiveUploadRequest;
use crate::handlers::channels::CreateChannelRequest;
use crate::handlers::collections::{TagCollectionRequest, UpdateCollectionRequest};
use crate::handlers::downloads::CreateDownloadRequest;
use crate::handlers::files::RefreshRequest;
use crate::handlers::inventories::CreateInventoryRequest;
use arca_core::events::Event;
use arca_core::models::tag::{CreateTagRequest, TagResponse};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "arca",
        description = "Self-hosted archive appliance API",
    ),
    components(schemas(
        CreateDownloadRequest,
        CreateChannelRequest,
        UpdateCollectionRequest,
        TagCollectionRequest,
        CreateTagRequest,
        TagResponse,
        RefreshRequest,
        ArchiveUploadRequest,
        CreateInventoryRequest,
        Event,
    ))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_builds() {
        let doc = ApiDoc::openapi();
        assert_eq!(doc.info.title, "arca");
    }
}
