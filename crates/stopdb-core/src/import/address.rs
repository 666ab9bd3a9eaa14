//! Street-address splitting for the AirTable exports.
//!
//! The exports carry addresses as a single free-text cell. The comma count
//! decides the shape; within a shape the state/zip pair anchors the split.
//! This matches the observed data, not the postal service.

use anyhow::bail;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

pub fn parse_address(raw: &str) -> anyhow::Result<Address> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Address::default());
    }
    let flat = raw.replace('\n', " ");
    let parts: Vec<&str> = flat.split(',').collect();
    match parts.len() {
        // "street, city, ST ZIP"
        3 => {
            let (state, zip_code) = split_state_zip(parts[2])?;
            Ok(Address {
                street: parts[0].trim().to_string(),
                city: parts[1].trim().to_string(),
                state,
                zip_code,
            })
        }
        // Either "street city, ST ZIP" or "street, city ST ZIP".
        2 => {
            if let Ok((state, zip_code)) = split_state_zip(parts[1]) {
                let mut tokens: Vec<&str> = parts[0].split_whitespace().collect();
                let city = tokens.pop().unwrap_or_default().to_string();
                Ok(Address {
                    street: tokens.join(" "),
                    city,
                    state,
                    zip_code,
                })
            } else {
                let tokens: Vec<&str> = parts[1].split_whitespace().collect();
                let [city, state, zip_code] = tokens.as_slice() else {
                    bail!("unexpected address format: {:?}", raw);
                };
                Ok(Address {
                    street: parts[0].trim().to_string(),
                    city: city.to_string(),
                    state: state.to_string(),
                    zip_code: zip_code.to_string(),
                })
            }
        }
        // "street... city ST ZIP" with no commas at all.
        1 => {
            let tokens: Vec<&str> = flat.split_whitespace().collect();
            if tokens.len() < 3 {
                bail!("unexpected address format: {:?}", raw);
            }
            let zip_code = tokens[tokens.len() - 1].to_string();
            let state = tokens[tokens.len() - 2].to_string();
            let city = tokens[tokens.len() - 3].to_string();
            Ok(Address {
                street: tokens[..tokens.len() - 3].join(" "),
                city,
                state,
                zip_code,
            })
        }
        _ => bail!("unexpected address format: {:?}", raw),
    }
}

fn split_state_zip(raw: &str) -> anyhow::Result<(String, String)> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    let [state, zip_code] = tokens.as_slice() else {
        bail!("expected \"ST ZIP\", got {:?}", raw);
    };
    Ok((state.to_string(), zip_code.to_string()))
}
