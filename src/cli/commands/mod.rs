use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};
use regex::Regex;

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn validator_regex() -> ValueParser {
    ValueParser::from(move |pattern: &str| -> std::result::Result<String, String> {
        Regex::new(pattern)
            .map(|_| pattern.to_string())
            .map_err(|err| format!("invalid pattern: {err}"))
    })
}

pub fn validator_portal() -> ValueParser {
    ValueParser::from(move |portal: &str| -> std::result::Result<String, String> {
        match portal {
            "employer" | "hub" => Ok(portal.to_string()),
            _ => Err("portal must be 'employer' or 'hub'".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("filch")
        .about("Edge route guard and session gateway for the Vetchi portals")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("FILCH_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("upstream")
                .short('u')
                .long("upstream")
                .help("Portal app base URL to proxy allowed requests to, example: http://harrypotter:3000")
                .env("FILCH_UPSTREAM")
                .required(true),
        )
        .arg(
            Arg::new("backend")
                .short('b')
                .long("backend")
                .help("Vetchi API base URL, example: https://api.vetchi.org")
                .env("FILCH_BACKEND")
                .required(true),
        )
        .arg(
            Arg::new("portal")
                .long("portal")
                .help("Portal flavor: employer or hub")
                .default_value("employer")
                .env("FILCH_PORTAL")
                .value_parser(validator_portal()),
        )
        .arg(
            Arg::new("public-path")
                .long("public-path")
                .help("Path reachable without authentication (repeatable)")
                .env("FILCH_PUBLIC_PATHS")
                .value_delimiter(',')
                .action(ArgAction::Append)
                .default_values(["/signin", "/signup", "/forgot-password", "/reset-password"]),
        )
        .arg(
            Arg::new("tfa-path")
                .long("tfa-path")
                .help("Second-factor page path")
                .default_value("/tfa")
                .env("FILCH_TFA_PATH"),
        )
        .arg(
            Arg::new("signin-path")
                .long("signin-path")
                .help("Sign-in page path, the target of guard redirects")
                .default_value("/signin")
                .env("FILCH_SIGNIN_PATH"),
        )
        .arg(
            Arg::new("home-path")
                .long("home-path")
                .help("Path already-authenticated users are sent to from public pages")
                .default_value("/")
                .env("FILCH_HOME_PATH"),
        )
        .arg(
            Arg::new("signup-link-pattern")
                .long("signup-link-pattern")
                .help("Regex for signup completion links that bypass the guard, example: ^/signup-orguser/")
                .env("FILCH_SIGNUP_LINK_PATTERN")
                .value_parser(validator_regex()),
        )
        .arg(
            Arg::new("session-ttl")
                .long("session-ttl")
                .help("Session cookie lifetime in seconds without remember-me")
                .default_value("43200")
                .env("FILCH_SESSION_TTL")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("secure-cookies")
                .long("secure-cookies")
                .help("Mark cookies Secure; enable when the portal is served over HTTPS")
                .env("FILCH_SECURE_COOKIES")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("FILCH_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "filch");
        assert_eq!(
            command.get_about().unwrap().to_string(),
            "Edge route guard and session gateway for the Vetchi portals"
        );
        assert_eq!(
            command.get_version().unwrap().to_string(),
            env!("CARGO_PKG_VERSION")
        );
    }

    #[test]
    fn test_required_args_and_defaults() {
        let command = new();
        let matches = command.get_matches_from(vec![
            "filch",
            "--upstream",
            "http://localhost:3000",
            "--backend",
            "https://api.vetchi.org",
        ]);

        assert_eq!(matches.get_one::<u16>("port").copied(), Some(8080));
        assert_eq!(
            matches.get_one::<String>("portal").map(String::as_str),
            Some("employer")
        );
        assert_eq!(
            matches.get_one::<String>("tfa-path").map(String::as_str),
            Some("/tfa")
        );
        let public: Vec<&String> = matches
            .get_many::<String>("public-path")
            .expect("defaults")
            .collect();
        assert_eq!(public.len(), 4);
        assert!(public.iter().any(|path| *path == "/signup"));
        assert!(!matches.get_flag("secure-cookies"));
    }

    #[test]
    fn test_env_fallbacks() {
        temp_env::with_vars(
            [
                ("FILCH_UPSTREAM", Some("http://localhost:3000")),
                ("FILCH_BACKEND", Some("https://api.vetchi.org")),
                ("FILCH_PORT", Some("9090")),
                ("FILCH_PORTAL", Some("hub")),
                ("FILCH_SECURE_COOKIES", Some("true")),
            ],
            || {
                let command = new();
                let matches = command.get_matches_from(vec!["filch"]);
                assert_eq!(matches.get_one::<u16>("port").copied(), Some(9090));
                assert_eq!(
                    matches.get_one::<String>("portal").map(String::as_str),
                    Some("hub")
                );
                assert!(matches.get_flag("secure-cookies"));
            },
        );
    }

    #[test]
    fn test_invalid_portal_rejected() {
        let command = new();
        let result = command.try_get_matches_from(vec![
            "filch",
            "--upstream",
            "http://localhost:3000",
            "--backend",
            "https://api.vetchi.org",
            "--portal",
            "admin",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_signup_pattern_rejected() {
        let command = new();
        let result = command.try_get_matches_from(vec![
            "filch",
            "--upstream",
            "http://localhost:3000",
            "--backend",
            "https://api.vetchi.org",
            "--signup-link-pattern",
            "([unclosed",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_check_log_level_verbosity() {
        // loop cover all possible value_parse
        let levels = vec!["error", "warn", "info", "debug", "trace"];
        for (index, _) in levels.iter().enumerate() {
            temp_env::with_vars([("FILCH_LOG_LEVEL", None::<String>)], || {
                let mut args = vec![
                    "filch".to_string(),
                    "--upstream".to_string(),
                    "http://localhost:3000".to_string(),
                    "--backend".to_string(),
                    "https://api.vetchi.org".to_string(),
                ];

                // Add the appropriate number of "-v" flags based on the index
                if index > 0 {
                    let v = format!("-{}", "v".repeat(index));
                    args.push(v);
                }

                let command = new();

                let matches = command.get_matches_from(args);

                assert_eq!(
                    matches.get_one::<u8>("verbosity").map(|s| *s),
                    Some(index as u8)
                );
            });
        }
    }
}
