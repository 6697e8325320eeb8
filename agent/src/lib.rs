//! The natproxy agent: the behind-NAT half of the reverse proxy. Holds a
//! persistent control channel to a broker and, on each `CONNECT`, dials
//! back to the broker and to its own local target, then splices them.

pub mod agent;
pub mod config;
