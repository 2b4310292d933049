//! Boot-time user-data (cloud-config) rendering

use serde::Serialize;

/// Created by the last boot command; its presence means setup finished
pub const SENTINEL_PATH: &str = "/.nodeflow_provisioned";

/// Packages installed on every node
pub const BASE_PACKAGES: [&str; 3] = ["git", "wget", "python"];

#[derive(Debug, Serialize)]
struct CloudConfig<'a> {
    user: &'a str,
    manage_etc_hosts: bool,
    hostname: &'a str,
    packages: Vec<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ssh_authorized_keys: Vec<&'a str>,
    runcmd: Vec<Vec<&'a str>>,
}

/// Render the `#cloud-config` document for a node
///
/// The boot commands remove the user's password, so console logins work
/// with keys only, then create [`SENTINEL_PATH`].
pub fn render(
    user: &str,
    hostname: &str,
    extra_packages: &[String],
    ssh_pubkey: Option<&str>,
) -> Result<String, serde_yaml::Error> {
    let mut packages: Vec<&str> = BASE_PACKAGES.to_vec();
    for package in extra_packages {
        if !packages.contains(&package.as_str()) {
            packages.push(package);
        }
    }

    let config = CloudConfig {
        user,
        manage_etc_hosts: true,
        hostname,
        packages,
        ssh_authorized_keys: ssh_pubkey.map(str::trim).into_iter().collect(),
        runcmd: vec![vec!["passwd", "-d", user], vec!["touch", SENTINEL_PATH]],
    };

    Ok(format!("#cloud-config\n{}", serde_yaml::to_string(&config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(doc: &str) -> serde_yaml::Value {
        let body = doc.strip_prefix("#cloud-config\n").unwrap();
        serde_yaml::from_str(body).unwrap()
    }

    #[test]
    fn test_render_with_key() {
        let doc = render("ubuntu", "smithi001", &[], Some("ssh-ed25519 AAAA me@host\n")).unwrap();
        let value = parse(&doc);

        assert_eq!(value["user"], "ubuntu");
        assert_eq!(value["hostname"], "smithi001");
        assert_eq!(value["manage_etc_hosts"].as_bool(), Some(true));
        assert_eq!(value["ssh_authorized_keys"][0], "ssh-ed25519 AAAA me@host");
        assert_eq!(value["runcmd"][0][0], "passwd");
        assert_eq!(value["runcmd"][0][2], "ubuntu");
        assert_eq!(value["runcmd"][1][1], SENTINEL_PATH);
    }

    #[test]
    fn test_render_without_key_omits_authorized_keys() {
        let doc = render("centos", "node", &[], None).unwrap();
        assert!(doc.starts_with("#cloud-config\n"));
        assert!(parse(&doc).get("ssh_authorized_keys").is_none());
    }

    #[test]
    fn test_extra_packages_are_appended_once() {
        let extra = vec!["git".to_string(), "ceph-common".to_string()];
        let value = parse(&render("ubuntu", "node", &extra, None).unwrap());
        let packages: Vec<&str> = value["packages"]
            .as_sequence()
            .unwrap()
            .iter()
            .map(|p| p.as_str().unwrap())
            .collect();
        assert_eq!(packages, vec!["git", "wget", "python", "ceph-common"]);
    }
}
