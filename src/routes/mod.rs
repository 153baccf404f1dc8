/// Router Module Index
///
/// Routes are split by the access they require; the authenticated router is
/// wrapped in the auth middleware by `create_router`.

/// Open to anonymous viewers.
pub mod public;

/// Requires a resolved `AuthUser`.
pub mod authenticated;

/// Requires the `admin` role, checked in the handlers.
pub mod admin;
