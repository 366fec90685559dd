//! Dedicated fields for the `network` section: port text and the address list

use tracing::info;

use crate::config::document::{merge_addresses, push_unique_address, validate_port};
use crate::config::schema::{NETWORK, UDP_PORT};
use crate::config::{ConfigDocument, ConfigError};

#[derive(Debug, Clone, Default)]
pub struct NetworkFields {
    /// Free text of the UDP port field
    pub port_text: String,
    /// Text of the "new light IP" entry
    pub new_address: String,
    /// Row selected in the address list
    pub selected: Option<usize>,
    addresses: Vec<String>,
}

impl NetworkFields {
    pub fn from_document(doc: &ConfigDocument) -> Self {
        Self {
            port_text: doc.udp_port().map(|p| p.to_string()).unwrap_or_default(),
            new_address: String::new(),
            selected: None,
            addresses: doc.light_ips().to_vec(),
        }
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    /// Add one address. Empty, malformed and duplicate addresses are rejected.
    pub fn add_address(&mut self, ip: &str) -> Result<(), ConfigError> {
        push_unique_address(&mut self.addresses, ip)?;
        info!(ip = %ip.trim(), "Added light address");
        Ok(())
    }

    /// Add the text of the entry field, clearing it on success
    pub fn add_entered(&mut self) -> Result<String, ConfigError> {
        let ip = self.new_address.trim().to_string();
        self.add_address(&ip)?;
        self.new_address.clear();
        Ok(ip)
    }

    pub fn remove_address(&mut self, ip: &str) -> bool {
        let Some(pos) = self.addresses.iter().position(|existing| existing == ip) else {
            return false;
        };
        self.addresses.remove(pos);
        self.selected = match self.selected {
            Some(sel) if sel == pos => None,
            Some(sel) if sel > pos => Some(sel - 1),
            other => other,
        };
        info!(ip = %ip, "Removed light address");
        true
    }

    pub fn remove_selected(&mut self) -> Option<String> {
        let ip = self.addresses.get(self.selected?)?.clone();
        self.remove_address(&ip);
        Some(ip)
    }

    /// Append discovered addresses that are not yet listed
    pub fn merge(&mut self, discovered: &[String]) -> Vec<String> {
        merge_addresses(&mut self.addresses, discovered.iter().map(String::as_str))
    }

    pub fn parse_port(&self) -> Result<i64, ConfigError> {
        let field = format!("{NETWORK}.{UDP_PORT}");
        let port: i64 = self
            .port_text
            .trim()
            .parse()
            .map_err(|_| ConfigError::validation(&field, format!("'{}' is not an integer", self.port_text)))?;
        validate_port(port).map_err(|reason| ConfigError::validation(field, reason))?;
        Ok(port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(ips: &[&str]) -> NetworkFields {
        NetworkFields {
            port_text: "38899".to_string(),
            addresses: ips.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_add_entered_clears_entry() {
        let mut net = fields(&[]);
        net.new_address = " 10.0.0.5 ".to_string();
        assert_eq!(net.add_entered().unwrap(), "10.0.0.5");
        assert!(net.new_address.is_empty());
        assert_eq!(net.addresses(), ["10.0.0.5".to_string()]);
    }

    #[test]
    fn test_add_duplicate_keeps_entry_text() {
        let mut net = fields(&["10.0.0.5"]);
        net.new_address = "10.0.0.5".to_string();
        assert!(net.add_entered().is_err());
        assert_eq!(net.new_address, "10.0.0.5");
        assert_eq!(net.addresses().len(), 1);
    }

    #[test]
    fn test_remove_selected_adjusts_selection() {
        let mut net = fields(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
        net.selected = Some(2);
        assert!(net.remove_address("10.0.0.1"));
        assert_eq!(net.selected, Some(1));
        assert_eq!(net.remove_selected(), Some("10.0.0.3".to_string()));
        assert_eq!(net.selected, None);
        assert_eq!(net.addresses(), ["10.0.0.2".to_string()]);
        assert_eq!(net.remove_selected(), None);
    }

    #[test]
    fn test_merge_is_ordered_and_deduplicated() {
        let mut net = fields(&[]);
        let found = vec!["192.168.1.10".to_string(), "192.168.1.11".to_string()];
        assert_eq!(net.merge(&found), found);
        assert!(net.merge(&found).is_empty());
        assert_eq!(net.addresses(), found.as_slice());
    }

    #[test]
    fn test_parse_port() {
        let mut net = fields(&[]);
        assert_eq!(net.parse_port().unwrap(), 38899);
        net.port_text = "abc".to_string();
        assert!(net.parse_port().is_err());
        net.port_text = "0".to_string();
        assert!(net.parse_port().is_err());
        net.port_text = "65536".to_string();
        assert!(net.parse_port().is_err());
    }
}
