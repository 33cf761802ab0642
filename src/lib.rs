pub mod action;
pub mod cache;
pub mod config;
pub mod exception;
pub mod exception_handler;
pub mod kernel;
pub mod loader;
pub mod matcher;
pub mod messages;
pub mod model;
pub mod param;
pub mod processor;
pub mod request;
pub mod resolver;
pub mod response;
pub mod session;
pub mod util;

pub use action::{Action, ActionForm, ActionRegistry, DynaActionForm, PlugIn, SharedForm};
pub use cache::{ConfigCache, ConfigProvider};
pub use config::ServerConfig;
pub use exception::{ActionException, ConfigError, Exception};
pub use exception_handler::{DefaultExceptionHandler, ExceptionHandler};
pub use kernel::{ActionKernel, KernelBuilder};
pub use matcher::ActionMatcher;
pub use messages::{ActionMessage, ActionMessages, MessageResources, PropertyMessageResources};
pub use param::{HttpRequestMethod, HttpVersion, Scope};
pub use processor::{Dispatcher, Preprocess, RequestProcessor};
pub use request::{Attribute, Request};
pub use resolver::ModuleResolver;
pub use response::Response;
pub use session::{Session, SessionStore};
pub use util::HtmlBuilder;
