//! Catalog selection: image, size and security groups

use crate::error::{ProvisionError, Result};
use nodeflow_cloud::{Image, SecurityGroup, Size};
use nodeflow_config::MachineConf;

/// Pick the first image whose name contains "<type> <version>", falling
/// back to "<type>-<version>". Matching ignores case.
pub fn select_image<'a>(images: &'a [Image], os_type: &str, os_version: &str) -> Result<&'a Image> {
    let os_type = os_type.to_lowercase();
    let os_version = os_version.to_lowercase();
    let specs = [
        format!("{} {}", os_type, os_version),
        format!("{}-{}", os_type, os_version),
    ];

    specs
        .iter()
        .find_map(|spec| {
            images
                .iter()
                .find(|image| image.name.to_lowercase().contains(spec.as_str()))
        })
        .ok_or_else(|| ProvisionError::NoMatchingImage {
            os_type,
            os_version,
        })
}

/// Cheapest size meeting every machine requirement, ordered by
/// (ram, disk, vcpus)
pub fn select_size<'a>(sizes: &'a [Size], machine: &MachineConf) -> Result<&'a Size> {
    sizes
        .iter()
        .filter(|s| s.ram >= machine.ram && s.disk >= machine.disk && s.vcpus >= machine.cpus)
        .min_by_key(|s| s.cost_key())
        .ok_or(ProvisionError::NoMatchingSize {
            ram: machine.ram,
            disk: machine.disk,
            cpus: machine.cpus,
        })
}

/// Resolve security group names against the catalog
///
/// `None` means no restriction was requested and yields `None`. Every
/// requested name must match exactly one group.
pub fn resolve_security_groups(
    catalog: &[SecurityGroup],
    names: Option<&[String]>,
) -> Result<Option<Vec<SecurityGroup>>> {
    let Some(names) = names else {
        return Ok(None);
    };

    let mut result = Vec::with_capacity(names.len());
    for name in names {
        let mut matches = catalog.iter().filter(|g| g.name == *name);
        match (matches.next(), matches.next()) {
            (None, _) => return Err(ProvisionError::SecurityGroupNotFound(name.clone())),
            (Some(_), Some(_)) => return Err(ProvisionError::AmbiguousSecurityGroup(name.clone())),
            (Some(group), None) => result.push(group.clone()),
        }
    }
    Ok(Some(result))
}
