pub mod bootstrap;
pub mod errors;
pub mod services;
pub mod sweep;

pub use bootstrap::{bootstrap, Application, BootstrapError};
pub use errors::ServiceError;
pub use services::{
    InvoiceService, NewInvoice, NewServiceReport, NewServiceRequest, ReportService,
    RequestService,
};
pub use sweep::SlaSweep;
