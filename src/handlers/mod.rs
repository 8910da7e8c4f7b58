pub(crate) mod auth;
pub(crate) mod payments;
pub(crate) mod reports;
pub(crate) mod shifts;
pub(crate) mod users;
