// Import necessary crates and modules
use keyring::Entry;
use log::{info, warn};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::process::exit;

const KEYRING_URL: &str = "URL_SCMS";
const KEYRING_TOKEN: &str = "TOKEN_SCMS";

/// Structure to hold SCMS API credentials.
///
/// Stores the base URL of the SCMS deployment (without the `/api` suffix) and
/// the bearer token issued at login. The HTTP client travels with the
/// credentials so every request reuses one connection pool.
///
/// Example usage:
/// ```
/// use scms_connector::ScmsCredentials;
/// let credentials = ScmsCredentials::new("https://scms.example.edu", "your_api_token");
/// assert_eq!(credentials.api_url("/api/user"), "https://scms.example.edu/api/user");
/// ```
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct ScmsCredentials {
    pub url_scms: String,
    pub token_scms: String,
    #[serde(skip)]
    pub client: Client,
}

// Enum to represent the source of SCMS credentials.
enum ScmsCredentialType {
    None,                            // No credentials available
    EnvVariables(ScmsCredentials),   // Credentials loaded from the environment
    SystemKeyring(ScmsCredentials),  // Credentials loaded from system's keyring
}

impl PartialEq for ScmsCredentials {
    fn eq(&self, other: &Self) -> bool {
        self.url_scms == other.url_scms && self.token_scms == other.token_scms
    }
}

impl ScmsCredentials {
    pub fn new(url: &str, token: &str) -> Self {
        ScmsCredentials {
            url_scms: url.trim_end_matches('/').to_string(),
            token_scms: token.to_string(),
            client: Client::new(),
        }
    }

    /// Joins an absolute API path (`/api/...`) onto the base URL.
    pub fn api_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.url_scms, path)
        } else {
            format!("{}/{}", self.url_scms, path)
        }
    }

    /// Tests the validity of SCMS API credentials.
    ///
    /// Performs a GET request for the current user to verify if the provided credentials are valid.
    ///
    /// Returns:
    /// - `Ok(200)`: If credentials are valid.
    /// - `Err(u16)`: The HTTP status code if credentials are invalid or any network error (0 for generic errors).
    fn test_scms_credentials(api_url: &str, access_token: &str) -> Result<u16, u16> {
        let client = Client::new();
        let res = client
            .get(format!("{}/api/user", api_url.trim_end_matches('/')))
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send();

        match res {
            Ok(response) => {
                if response.status().is_success() {
                    Ok(200)
                } else {
                    Err(response.status().as_u16())
                }
            }
            Err(_) => Err(0),
        }
    }

    /// Loads SCMS credentials from the `SCMS_URL` and `SCMS_TOKEN` environment variables.
    ///
    /// Only active with the `use_env_credentials` feature; otherwise always an error.
    pub fn load_credentials_from_env() -> Result<ScmsCredentials, String> {
        #[cfg(not(feature = "use_env_credentials"))]
        {
            return Err("Feature not enabled".to_string());
        }

        #[cfg(feature = "use_env_credentials")]
        {
            match std::env::var("SCMS_URL") {
                Ok(url) => match std::env::var("SCMS_TOKEN") {
                    Ok(token) => {
                        info!("Credentials loaded from environment -> {}", url);
                        Ok(ScmsCredentials::new(&url, &token))
                    }
                    Err(_) => Err("Error retrieving token from environment".to_string()),
                },
                Err(_) => Err("Error retrieving URL from environment".to_string()),
            }
        }
    }

    /// Loads SCMS credentials from the system's keyring.
    ///
    /// Returns:
    /// - `Ok(ScmsCredentials)`: Credentials if successfully retrieved.
    /// - `Err(String)`: Error message if issues occur accessing the keyring or retrieving credentials.
    pub fn load_credentials_from_system() -> Result<ScmsCredentials, String> {
        let app_name = env!("CARGO_PKG_NAME");
        let url = Entry::new(app_name, KEYRING_URL)
            .and_then(|entry| entry.get_password())
            .map_err(|_| "Error retrieving URL from system".to_string())?;
        let token = Entry::new(app_name, KEYRING_TOKEN)
            .and_then(|entry| entry.get_password())
            .map_err(|_| "Error retrieving token from system".to_string())?;
        Ok(ScmsCredentials::new(&url, &token))
    }

    /// Stores the credentials in the system's keyring, replacing any previous pair.
    ///
    /// Used after a successful login so the next session starts authenticated.
    pub fn save_to_system(&self) -> Result<(), String> {
        let app_name = env!("CARGO_PKG_NAME");
        Entry::new(app_name, KEYRING_URL)
            .and_then(|entry| entry.set_password(&self.url_scms))
            .map_err(|e| format!("Error saving URL: {}", e))?;
        Entry::new(app_name, KEYRING_TOKEN)
            .and_then(|entry| entry.set_password(&self.token_scms))
            .map_err(|e| format!("Error saving token: {}", e))?;
        Ok(())
    }

    /// Removes the stored token (logout). The URL is kept for the next login.
    pub fn forget_token() -> Result<(), String> {
        let app_name = env!("CARGO_PKG_NAME");
        Entry::new(app_name, KEYRING_TOKEN)
            .and_then(|entry| entry.delete_password())
            .map_err(|e| format!("Error removing token: {}", e))
    }

    // Environment first, then the keyring.
    fn load_credentials() -> ScmsCredentialType {
        match Self::load_credentials_from_env() {
            Ok(credentials) => ScmsCredentialType::EnvVariables(credentials),
            Err(_) => match Self::load_credentials_from_system() {
                Ok(credentials) => ScmsCredentialType::SystemKeyring(credentials),
                Err(_) => ScmsCredentialType::None,
            },
        }
    }

    fn read_line() -> String {
        let mut input = String::new();
        if std::io::stdin().read_line(&mut input).is_err() {
            return String::new();
        }
        input.trim().to_string()
    }

    /// Interactively sets and stores SCMS credentials in the system's keyring.
    ///
    /// Prompts for the server URL and token, stores them and validates them against the API.
    fn set_system_credentials() -> ScmsCredentialType {
        loop {
            println!("Do you wish to register the credentials? (y/n)");
            if Self::read_line().to_uppercase() != "Y" {
                return ScmsCredentialType::None;
            }
            println!("Enter the SCMS URL:");
            let url = Self::read_line();
            println!("Enter the SCMS token:");
            let token = Self::read_line();

            let credentials = ScmsCredentials::new(&url, &token);
            if let Err(e) = credentials.save_to_system() {
                eprintln!("{}", e);
                continue;
            }

            match Self::test_scms_credentials(&credentials.url_scms, &credentials.token_scms) {
                Ok(_) => return ScmsCredentialType::SystemKeyring(credentials),
                Err(status_code) if status_code == 401 || status_code == 403 => {
                    println!("Incorrect credentials");
                    continue;
                }
                Err(status_code) => {
                    println!("Error accessing SCMS API - Status Code {}", status_code);
                    exit(1);
                }
            }
        }
    }

    /// Retrieves SCMS credentials, using either stored credentials or prompting the user to input them.
    ///
    /// Stored credentials are validated before being returned; the process exits
    /// when no usable credentials can be obtained.
    pub fn credentials() -> ScmsCredentials {
        match Self::load_credentials() {
            ScmsCredentialType::None => match Self::set_system_credentials() {
                ScmsCredentialType::SystemKeyring(credentials) => credentials,
                _ => {
                    println!("Error obtaining credentials");
                    exit(1);
                }
            },
            ScmsCredentialType::EnvVariables(credentials)
            | ScmsCredentialType::SystemKeyring(credentials) => {
                match Self::test_scms_credentials(&credentials.url_scms, &credentials.token_scms) {
                    Ok(_) => credentials,
                    Err(e) => {
                        warn!("Stored credentials rejected with status {}", e);
                        println!("Error accessing SCMS API - Status Code {}", e);
                        exit(1);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scms_credentials_initialization() {
        let credentials = ScmsCredentials::new("https://example.com/", "secret-token");

        assert_eq!(credentials.url_scms, "https://example.com");
        assert_eq!(credentials.token_scms, "secret-token");
    }

    #[test]
    fn test_api_url_joins_paths() {
        let credentials = ScmsCredentials::new("https://example.com", "t");
        assert_eq!(
            credentials.api_url("/api/teacher/classroom/ABC123"),
            "https://example.com/api/teacher/classroom/ABC123"
        );
        assert_eq!(credentials.api_url("api/user"), "https://example.com/api/user");
    }

    #[test]
    fn test_equality_ignores_client() {
        let a = ScmsCredentials::new("https://example.com", "t");
        let b = ScmsCredentials::new("https://example.com", "t");
        assert_eq!(a, b);
    }

    #[test]
    #[cfg(feature = "use_env_credentials")]
    fn test_load_credentials_from_env() {
        use std::collections::HashMap;
        use std::env;

        let mut map: HashMap<String, String> = HashMap::new();
        fn set_new_key(map: &mut HashMap<String, String>, key: &str, value: &str) {
            if let Ok(value) = env::var(key) {
                map.insert(key.to_string(), value);
            }
            env::set_var(key, value);
        }

        fn restore_key(map: &HashMap<String, String>, key: &str) {
            if let Some(value) = map.get(key) {
                env::set_var(key, value);
            } else {
                env::remove_var(key);
            }
        }

        let url_key = "SCMS_URL";
        let token_key = "SCMS_TOKEN";

        set_new_key(&mut map, url_key, "https://example.com");
        set_new_key(&mut map, token_key, "secret-token");

        let both_credentials = ScmsCredentials::load_credentials_from_env();

        env::remove_var(token_key);
        let only_url = ScmsCredentials::load_credentials_from_env();

        env::remove_var(url_key);
        env::set_var(token_key, "secret-token");
        let only_token = ScmsCredentials::load_credentials_from_env();

        env::remove_var(token_key);
        let no_credentials = ScmsCredentials::load_credentials_from_env();

        restore_key(&map, token_key);
        restore_key(&map, url_key);

        assert!(both_credentials.is_ok());
        assert!(only_url.is_err());
        assert!(only_token.is_err());
        assert!(no_credentials.is_err());
    }
}
