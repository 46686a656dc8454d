pub mod connect;
pub mod disconnect;
pub mod message;
pub mod nick;
pub mod quit;
pub mod whois;
