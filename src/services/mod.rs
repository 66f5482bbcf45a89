pub mod chart_service;
pub mod indicator_service;
pub mod label_layout;
pub mod reshape_service;
pub mod workbook_service;
