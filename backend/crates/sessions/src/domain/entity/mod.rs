pub mod session_payload;
pub mod session_record;
