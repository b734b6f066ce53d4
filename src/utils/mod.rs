pub mod db_utils;
pub mod filters;
pub mod validation;
