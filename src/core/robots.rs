//! Best-effort crawl-permission check.
//!
//! The outcome is advisory: a disallow is logged as a warning and the run
//! continues. Callers must not turn it into a hard stop.

use crate::config::site::SiteConfig;
use crate::domain::ports::PageSession;
use crate::utils::error::Result;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    Allowed,
    Disallowed { rule: String },
}

/// Fetches `/robots.txt` and evaluates the site's listing path against it.
pub async fn check_crawl_permission(
    session: &mut dyn PageSession,
    site: &SiteConfig,
    user_agent: &str,
) -> Result<Permission> {
    let robots_url = Url::parse(&site.base_url)?.join("/robots.txt")?;
    let page = session.navigate(robots_url.as_str()).await?;
    Ok(evaluate(page.body(), user_agent, &site.listing_path))
}

/// Longest-match evaluation of `path` against the group for `user_agent`,
/// falling back to the `*` group.
pub fn evaluate(robots: &str, user_agent: &str, path: &str) -> Permission {
    let agent = user_agent
        .split('/')
        .next()
        .unwrap_or(user_agent)
        .to_ascii_lowercase();

    let groups = parse_groups(robots);
    let group = groups
        .iter()
        .find(|g| g.agents.iter().any(|a| a != "*" && agent.contains(a.as_str())))
        .or_else(|| groups.iter().find(|g| g.agents.iter().any(|a| a == "*")));

    let Some(group) = group else {
        return Permission::Allowed;
    };

    let mut best: Option<(&RobotsRule, usize)> = None;
    for rule in &group.rules {
        if rule.path.is_empty() || !path.starts_with(rule.path.as_str()) {
            continue;
        }
        let len = rule.path.len();
        let better = match best {
            None => true,
            Some((current, current_len)) => {
                len > current_len || (len == current_len && rule.allow && !current.allow)
            }
        };
        if better {
            best = Some((rule, len));
        }
    }

    match best {
        Some((rule, _)) if !rule.allow => Permission::Disallowed {
            rule: format!("Disallow: {}", rule.path),
        },
        _ => Permission::Allowed,
    }
}

#[derive(Debug, Default)]
struct RobotsGroup {
    agents: Vec<String>,
    rules: Vec<RobotsRule>,
}

#[derive(Debug)]
struct RobotsRule {
    allow: bool,
    path: String,
}

fn parse_groups(robots: &str) -> Vec<RobotsGroup> {
    let mut groups: Vec<RobotsGroup> = Vec::new();
    let mut current = RobotsGroup::default();
    let mut in_rules = false;

    for line in robots.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                if in_rules {
                    groups.push(std::mem::take(&mut current));
                    in_rules = false;
                }
                current.agents.push(value.to_ascii_lowercase());
            }
            "allow" | "disallow" => {
                in_rules = true;
                current.rules.push(RobotsRule {
                    allow: key == "allow",
                    path: value.to_string(),
                });
            }
            _ => {}
        }
    }

    if !current.agents.is_empty() {
        groups.push(current);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROBOTS: &str = "\
User-agent: *
Disallow: /checkout
Disallow: /collections/private
Allow: /collections/private/public

User-agent: bean-crawler
Disallow: /collections
";

    #[test]
    fn test_wildcard_group() {
        assert_eq!(evaluate(ROBOTS, "other-bot/1.0", "/collections/coffee"), Permission::Allowed);
        assert!(matches!(
            evaluate(ROBOTS, "other-bot/1.0", "/checkout/cart"),
            Permission::Disallowed { .. }
        ));
        assert_eq!(
            evaluate(ROBOTS, "other-bot/1.0", "/collections/private/public/x"),
            Permission::Allowed
        );
    }

    #[test]
    fn test_named_group_takes_precedence() {
        assert_eq!(
            evaluate(ROBOTS, "bean-crawler/0.1.0", "/collections/coffee"),
            Permission::Disallowed {
                rule: "Disallow: /collections".to_string()
            }
        );
    }

    #[test]
    fn test_empty_disallow_allows_everything() {
        assert_eq!(evaluate("User-agent: *\nDisallow:\n", "x", "/"), Permission::Allowed);
        assert_eq!(evaluate("", "x", "/"), Permission::Allowed);
    }
}
