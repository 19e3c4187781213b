pub mod browser;
pub mod http;

pub use browser::BrowserSource;
pub use http::HttpSource;
