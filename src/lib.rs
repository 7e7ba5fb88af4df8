pub mod handler;
pub mod http;
pub mod settings;

pub use handler::RequestHandler;
pub use http::{HttpError, Method, Response};
pub use settings::Settings;
