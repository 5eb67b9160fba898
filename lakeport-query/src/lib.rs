//! SQL sessions over lake catalogs, including `CALL` procedure execution.

pub mod analyzer;
pub mod call;
pub mod session;
pub mod util;

pub use analyzer::{analyze_call, ResolvedCall};
pub use call::{CallStatement, RawCallArgument};
pub use session::LakeSession;
pub use util::{result_batch, result_schema, RESULT_COLUMN};
