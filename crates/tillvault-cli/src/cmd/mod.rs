pub(crate) mod backup;
pub(crate) mod daemon;
pub(crate) mod delete;
pub(crate) mod export;
pub(crate) mod list;
pub(crate) mod restore;
pub(crate) mod status;
