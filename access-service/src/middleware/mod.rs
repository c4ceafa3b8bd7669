pub mod admin;
pub mod context;

pub use admin::admin_member_middleware;
pub use context::{CurrentMember, RequestContext, ACCOUNT_ID_HEADER, PROJECT_ID_HEADER, USER_ID_HEADER};
