pub mod delivery;
pub mod driver;
pub mod location;
pub mod notification;
pub mod proof;
pub mod rating;
pub mod scan;
