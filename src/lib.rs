pub mod app;
pub mod case;
pub mod expect;
pub mod failure;
pub mod headers;
pub mod pattern;
pub mod query;
pub mod report;
pub mod response;
pub mod routing;
pub mod xpath;

pub use app::{Application, DispatchInfo, RouteSpec, RouterApplication};
pub use case::{Assertion, AssertionCounter, AssertionReporter, Check, HttpControllerTestCase};
pub use expect::Expectation;
pub use failure::{AssertionFailure, CheckError, QueryError};
pub use query::{Namespaces, SelectorKind};
pub use response::{TestRequest, TestResponse};
