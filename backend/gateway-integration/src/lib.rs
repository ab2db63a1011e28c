//! Gateway protocol integration.
//!
//! Everything that is specific to the FonePay wire protocol lives here: the
//! redirect digest scheme, the bulk vote payload carried through the
//! auxiliary field, the merchant-API verification call, and the settlement
//! decision table. The HTTP server orchestrates; this crate only builds and
//! interprets protocol data.

pub mod fonepay;
