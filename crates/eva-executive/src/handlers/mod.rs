//! The five HTTP endpoints named in spec §4.3's interface surface, one module
//! per endpoint, wired together by [`crate::router::build_router`].

pub mod events;
pub mod health;
pub mod insight;
pub mod jobs_run;
pub mod respond;
