//! Derived metrics added after the catalog transformation.

pub mod emissions;
pub mod energy;
pub mod income;
pub mod income_map;
pub mod panel;
pub mod upgrade_details;

pub use emissions::{enumerate_fuel_emissions, fix_all_fuels_emissions, Fuel, FuelEmission};
pub use energy::fix_site_energy_total;
pub use income::{add_energy_burden, add_income_and_burden, parse_income, verify_representative_income};
pub use income_map::{assign_representative_income, Geography, IncomeLookup};
pub use panel::{add_panel_constraints, classify_overall};
pub use upgrade_details::add_upgrade_columns;
