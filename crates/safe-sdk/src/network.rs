use serde::Deserialize;

/// Public API deployments of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiHost {
    #[default]
    Default,
    Zeromesh,
}

impl ApiHost {
    pub fn base_url(self) -> &'static str {
        match self {
            ApiHost::Default => "https://api.mixin.one",
            ApiHost::Zeromesh => "https://mixin-api.zeromesh.net",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ApiHost::Default => "default",
            ApiHost::Zeromesh => "zeromesh",
        }
    }
}

impl std::fmt::Display for ApiHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ApiHost {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" | "mixin" => Ok(ApiHost::Default),
            "zeromesh" => Ok(ApiHost::Zeromesh),
            _ => Err(format!("invalid api host: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("ZeroMesh".parse::<ApiHost>().unwrap(), ApiHost::Zeromesh);
        assert_eq!("default".parse::<ApiHost>().unwrap(), ApiHost::Default);
        assert!("mainnet".parse::<ApiHost>().is_err());
    }

    #[test]
    fn deserializes_lowercase() {
        let host: ApiHost = serde_json::from_str("\"zeromesh\"").unwrap();
        assert_eq!(host.base_url(), "https://mixin-api.zeromesh.net");
        assert_eq!(ApiHost::default().to_string(), "default");
        assert_eq!(ApiHost::Zeromesh.to_string().parse::<ApiHost>().unwrap(), ApiHost::Zeromesh);
    }
}
