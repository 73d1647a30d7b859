//! Service endpoints and listing field names.
//!
//! Everything the client knows about the remote service lives here so a test
//! (or a future mirror of the service) can point the client elsewhere.

const INBOX_HOST: &str = "https://www.canadapost-postescanada.ca";
const STREAM_HOST: &str = "https://www.epost.ca";

/// Endpoints, fixed query values and JSON field names used by the client.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Landing page scanned for the SSO token.
    pub landing_url: String,
    /// Folder listing endpoint.
    pub listing_url: String,
    /// Per-item document stream endpoint.
    pub item_url: String,
    /// Query parameter carrying the item id on `item_url`.
    pub item_id_param: String,
    /// Value of the listing `sortField` parameter.
    pub sort_field: String,
    /// Value of the listing `order` parameter.
    pub order: String,
    /// Items requested per listing page; also the offset stride.
    pub page_size: u64,
    /// Field names inside the listing JSON.
    pub fields: ListingFields,
}

/// JSON field names of the folder listing response.
#[derive(Debug, Clone)]
pub struct ListingFields {
    /// Total number of items in the folder (optional in responses).
    pub total: String,
    /// Array of item records.
    pub items: String,
    /// Item identifier inside each record.
    pub item_id: String,
    /// Short description inside each record.
    pub description: String,
}

impl Default for ListingFields {
    fn default() -> Self {
        Self {
            total: "numTotal".to_string(),
            items: "mailitemInfos".to_string(),
            item_id: "mailItemID".to_string(),
            description: "shortDescription".to_string(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::with_hosts(INBOX_HOST, STREAM_HOST)
    }
}

impl ServiceConfig {
    /// Build a config with the standard paths under custom hosts.
    ///
    /// `inbox_host` serves the landing page and listing; `stream_host` serves
    /// document bodies. Both may be the same (e.g. a local mock server).
    pub fn with_hosts(inbox_host: &str, stream_host: &str) -> Self {
        let inbox = inbox_host.trim_end_matches('/');
        let stream = stream_host.trim_end_matches('/');
        Self {
            landing_url: format!("{inbox}/inbox/en"),
            listing_url: format!("{inbox}/inbox/rs/mailitem"),
            item_url: format!("{stream}/service/displayMailStream.a"),
            item_id_param: "importSummaryId".to_string(),
            sort_field: "1".to_string(),
            order: "D".to_string(),
            page_size: 50,
            fields: ListingFields::default(),
        }
    }
}
