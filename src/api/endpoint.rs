use std::fmt;

/// Gateway documents kept in the endpoint cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    ProductionJson,
    ProductionV1,
    ProductionInverters,
    EnsembleInventory,
    HomeJson,
    DevStatus,
    ProductionPower,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::ProductionJson => "/production.json?details=1",
            Endpoint::ProductionV1 => "/api/v1/production",
            Endpoint::ProductionInverters => "/api/v1/production/inverters",
            Endpoint::EnsembleInventory => "/ivp/ensemble/inventory",
            Endpoint::HomeJson => "/home.json",
            Endpoint::DevStatus => "/ivp/peb/devstatus",
            Endpoint::ProductionPower => "/ivp/mod/603980032/mode/power",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Endpoint::ProductionJson => "production_json",
            Endpoint::ProductionV1 => "production_v1",
            Endpoint::ProductionInverters => "production_inverters",
            Endpoint::EnsembleInventory => "ensemble_inventory",
            Endpoint::HomeJson => "home_json",
            Endpoint::DevStatus => "devstatus",
            Endpoint::ProductionPower => "production_power",
        }
    }

    /// Installer endpoints keep their last good response when a fetch fails.
    pub fn installer_only(self) -> bool {
        matches!(self, Endpoint::DevStatus | Endpoint::ProductionPower)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub const CHECK_JWT: &str = "/auth/check_jwt";
pub const INFO: &str = "/info.xml";

/* Cloud identity service, relative to the configured enlighten URL */
pub const ENLIGHTEN_TOKEN: &str = "/entrez-auth-token";
