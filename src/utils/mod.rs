pub mod url;

pub use url::UrlUtils;
