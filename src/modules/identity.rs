use std::env;

use crate::config::{Config, EmployeeConfig};

/// Who is using the client, as shown in the header.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub username: String,
    pub hostname: String,
    pub employee: Option<EmployeeConfig>,
}

impl Identity {
    pub fn resolve(config: &Config) -> Self {
        let username = config.username.clone().unwrap_or_else(current_username);
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string());
        Self::with_directory(username, hostname, &config.employees)
    }

    pub fn with_directory(username: String, hostname: String, employees: &[EmployeeConfig]) -> Self {
        let employee = employees.iter().find(|e| e.user_id == username).cloned();
        Self { username, hostname, employee }
    }

    /// Employee name when the user is in the directory, else the login name.
    pub fn display_name(&self) -> &str {
        self.employee
            .as_ref()
            .map(|e| e.name.as_str())
            .unwrap_or(&self.username)
    }

    pub fn department(&self) -> Option<&str> {
        self.employee.as_ref().and_then(|e| e.department.as_deref())
    }

    pub fn login(&self) -> String {
        format!("{}@{}", self.username, self.hostname)
    }
}

fn current_username() -> String {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| "user".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> Vec<EmployeeConfig> {
        vec![EmployeeConfig {
            user_id: "jdoe".into(),
            name: "Jane Doe".into(),
            department: Some("Finance".into()),
        }]
    }

    #[test]
    fn prefers_employee_name() {
        let id = Identity::with_directory("jdoe".into(), "box".into(), &directory());
        assert_eq!(id.display_name(), "Jane Doe");
        assert_eq!(id.department(), Some("Finance"));
        assert_eq!(id.login(), "jdoe@box");
    }

    #[test]
    fn falls_back_to_username() {
        let id = Identity::with_directory("guest".into(), "box".into(), &directory());
        assert_eq!(id.display_name(), "guest");
        assert_eq!(id.department(), None);
    }
}
