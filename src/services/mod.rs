pub mod assembler;
pub mod exam_flow;
pub mod question_bank;
pub mod question_service;
pub mod quota;
pub mod scorer;
pub mod stores;
