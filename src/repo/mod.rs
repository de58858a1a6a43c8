//! Explicit data-access functions. Every function takes the pool (or an open
//! transaction) and the employee it acts for; nothing reads ambient state.

pub mod attendance;
pub mod employee;
pub mod leave_request;
pub mod organization;

/// Typed value for dynamically built WHERE clauses
pub(crate) enum FilterValue<'a> {
    U64(u64),
    I32(i32),
    Str(&'a str),
}

/// Binds `args` in order onto a runtime query.
macro_rules! bind_all {
    ($query:expr, $args:expr) => {{
        let mut q = $query;
        for arg in $args {
            q = match arg {
                $crate::repo::FilterValue::U64(v) => q.bind(*v),
                $crate::repo::FilterValue::I32(v) => q.bind(*v),
                $crate::repo::FilterValue::Str(s) => q.bind(*s),
            };
        }
        q
    }};
}

pub(crate) use bind_all;
