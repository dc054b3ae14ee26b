//! network section checks
//!
//! Subnet ranges are compared pairwise; two ranges overlap when either contains the other's
//! network address. Each route needs exactly one next hop.
use super::rules::VPC_NAME;
use super::sections::Names;
use super::ValidationReport;
use crate::config::{LoadBalancer, NatGateway, NetworkConfig, Peering, Route, Subnet};
use ipnet::IpNet;
use std::net::IpAddr;

const SUBNET_MODES: &[&str] = &["custom", "auto", "legacy"];
const ROUTING_MODES: &[&str] = &["regional", "global"];
const IP_ALLOCATIONS: &[&str] = &["AUTO_ONLY", "MANUAL_ONLY"];
const LOAD_BALANCER_TYPES: &[&str] = &["APPLICATION", "NETWORK", "CLASSIC"];
const LOAD_BALANCER_SCHEMES: &[&str] = &["EXTERNAL", "INTERNAL", "EXTERNAL_MANAGED"];

pub(super) fn cidr(range: &str) -> Option<IpNet> {
    range.parse().ok()
}

pub(super) fn ip_or_cidr(address: &str) -> bool {
    cidr(address).is_some() || address.parse::<IpAddr>().is_ok()
}

fn overlap(a: &IpNet, b: &IpNet) -> bool {
    a.contains(&b.network()) || b.contains(&a.network())
}

pub(super) fn network(network: &NetworkConfig, report: &mut ValidationReport) {
    if !network.vpc_name.is_empty() && !VPC_NAME.is_match(&network.vpc_name) {
        report.error(
            "network.vpc_name",
            &network.vpc_name,
            "VPC name must start with lowercase letter and contain only lowercase letters, \
             numbers, and hyphens",
        );
    }
    if !network.subnet_mode.is_empty() && !SUBNET_MODES.contains(&network.subnet_mode.as_str()) {
        report.error(
            "network.subnet_mode",
            &network.subnet_mode,
            "Invalid subnet mode",
        );
    }
    if !network.routing_mode.is_empty()
        && !ROUTING_MODES.contains(&network.routing_mode.as_str())
    {
        report.error(
            "network.routing_mode",
            &network.routing_mode,
            "Invalid routing mode",
        );
    }
    if network.mtu != 0 && !(1460..=1500).contains(&network.mtu) {
        report.error("network.mtu", network.mtu, "MTU must be between 1460 and 1500");
    }

    subnets(&network.subnets, report);
    routes(&network.routes, report);
    peerings(&network.peerings, report);
    nat_gateways(&network.nat_gateways, report);
    load_balancers(&network.load_balancers, report);
}

fn subnets(subnets: &[Subnet], report: &mut ValidationReport) {
    let mut names = Names::default();
    let mut ranges: Vec<(&str, IpNet)> = Vec::new();

    for (i, subnet) in subnets.iter().enumerate() {
        let field = |suffix: &str| format!("network.subnets[{i}].{suffix}");

        if subnet.name.is_empty() {
            report.error(field("name"), "", "Subnet name is required");
            continue;
        }
        if names.duplicate(&subnet.name) {
            report.error(field("name"), &subnet.name, "Duplicate subnet name");
        }

        if subnet.cidr.is_empty() {
            report.error(field("cidr"), "", "Subnet CIDR is required");
        } else if let Some(range) = cidr(&subnet.cidr) {
            for (other, _) in ranges.iter().filter(|(_, other)| overlap(&range, other)) {
                report.error(
                    field("cidr"),
                    &subnet.cidr,
                    format!("CIDR overlap with subnet {other}"),
                );
            }
            ranges.push((subnet.name.as_str(), range));
        } else {
            report.error(field("cidr"), &subnet.cidr, "Invalid CIDR format");
        }

        if subnet.region.is_empty() {
            report.error(field("region"), "", "Subnet region is required");
        }

        for (j, secondary) in subnet.secondary_ranges.iter().enumerate() {
            if secondary.name.is_empty() {
                report.error(
                    field(&format!("secondary_ranges[{j}].name")),
                    "",
                    "Secondary range name is required",
                );
            }
            if cidr(&secondary.cidr).is_none() {
                report.error(
                    field(&format!("secondary_ranges[{j}].cidr")),
                    &secondary.cidr,
                    "Invalid CIDR format",
                );
            }
        }
    }
}

fn routes(routes: &[Route], report: &mut ValidationReport) {
    let mut names = Names::default();

    for (i, route) in routes.iter().enumerate() {
        let field = |suffix: &str| format!("network.routes[{i}].{suffix}");

        if route.name.is_empty() {
            report.error(field("name"), "", "Route name is required");
            continue;
        }
        if names.duplicate(&route.name) {
            report.error(field("name"), &route.name, "Duplicate route name");
        }

        if route.dest_range.is_empty() {
            report.error(
                field("dest_range"),
                "",
                "Route destination range is required",
            );
        } else if cidr(&route.dest_range).is_none() {
            report.error(
                field("dest_range"),
                &route.dest_range,
                "Invalid destination CIDR format",
            );
        }

        match route.next_hops().count() {
            0 => report.error(
                format!("network.routes[{i}]"),
                "",
                "Route must have exactly one next hop",
            ),
            1 => {}
            _ => {
                let hops: Vec<&str> = route.next_hops().map(|(name, _)| name).collect();
                report.error(
                    format!("network.routes[{i}]"),
                    hops.join(", "),
                    "Route can only have one next hop",
                )
            }
        }

        if !(0..=65535).contains(&route.priority) {
            report.error(
                field("priority"),
                route.priority,
                "Priority must be between 0 and 65535",
            );
        }
    }
}

fn peerings(peerings: &[Peering], report: &mut ValidationReport) {
    let mut names = Names::default();

    for (i, peering) in peerings.iter().enumerate() {
        let field = |suffix: &str| format!("network.peerings[{i}].{suffix}");

        if peering.name.is_empty() {
            report.error(field("name"), "", "Peering name is required");
            continue;
        }
        if names.duplicate(&peering.name) {
            report.error(field("name"), &peering.name, "Duplicate peering name");
        }
        if peering.peer_network.is_empty() {
            report.error(field("peer_network"), "", "Peer network is required");
        }
    }
}

fn nat_gateways(gateways: &[NatGateway], report: &mut ValidationReport) {
    let mut names = Names::default();

    for (i, gateway) in gateways.iter().enumerate() {
        let field = |suffix: &str| format!("network.nat_gateways[{i}].{suffix}");

        if gateway.name.is_empty() {
            report.error(field("name"), "", "NAT gateway name is required");
            continue;
        }
        if names.duplicate(&gateway.name) {
            report.error(field("name"), &gateway.name, "Duplicate NAT gateway name");
        }
        if gateway.region.is_empty() {
            report.error(field("region"), "", "NAT gateway region is required");
        }
        if gateway.router.is_empty() {
            report.error(field("router"), "", "NAT gateway router is required");
        }
        if !gateway.ip_allocation_option.is_empty()
            && !IP_ALLOCATIONS.contains(&gateway.ip_allocation_option.as_str())
        {
            report.error(
                field("ip_allocation_option"),
                &gateway.ip_allocation_option,
                "Invalid IP allocation option",
            );
        }
        if !(0..=65536).contains(&gateway.min_ports_per_vm) {
            report.error(
                field("min_ports_per_vm"),
                gateway.min_ports_per_vm,
                "Min ports per VM must be between 0 and 65536",
            );
        }
        for ip in &gateway.nat_ips {
            if ip.parse::<IpAddr>().is_err() && !ip.starts_with("projects/") {
                report.error(field("nat_ips"), ip, "Invalid NAT IP address");
            }
        }
    }
}

fn load_balancers(balancers: &[LoadBalancer], report: &mut ValidationReport) {
    let mut names = Names::default();

    for (i, balancer) in balancers.iter().enumerate() {
        let field = |suffix: &str| format!("network.load_balancers[{i}].{suffix}");

        if balancer.name.is_empty() {
            report.error(field("name"), "", "Load balancer name is required");
            continue;
        }
        if names.duplicate(&balancer.name) {
            report.error(field("name"), &balancer.name, "Duplicate load balancer name");
        }
        if !balancer.kind.is_empty() && !LOAD_BALANCER_TYPES.contains(&balancer.kind.as_str()) {
            report.error(field("type"), &balancer.kind, "Invalid load balancer type");
        }
        if !balancer.scheme.is_empty()
            && !LOAD_BALANCER_SCHEMES.contains(&balancer.scheme.as_str())
        {
            report.error(
                field("scheme"),
                &balancer.scheme,
                "Invalid load balancer scheme",
            );
        }
        if !(1..=65535).contains(&balancer.port) {
            report.error(
                field("port"),
                balancer.port,
                "Port must be between 1 and 65535",
            );
        }
    }
}
