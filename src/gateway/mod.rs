mod http;

pub use http::{router, run_http, ServiceStatusResponse, WebhookQuery};
