use crate::{PasswordHash, Quota, StoreError};

/// One registered user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub password: PasswordHash,
    pub quota: Quota,
}

/// Parse one `username:password:limit` line
///
/// Blank lines yield `Ok(None)`.
pub(crate) fn parse_line(number: usize, line: &str) -> Result<Option<(String, Credential)>, StoreError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(None);
    }

    let malformed = |reason: &str| StoreError::Malformed {
        line: number,
        reason: reason.to_owned(),
    };

    let fields: Vec<&str> = line.split(':').collect();
    let [username, password, limit] = fields.as_slice() else {
        return Err(malformed("expected exactly three ':'-separated fields"));
    };

    validate_username(username).map_err(|_| malformed("empty or padded username"))?;
    if password.is_empty() {
        return Err(malformed("empty password"));
    }

    let limit: i64 = limit.trim().parse().map_err(|_| malformed("limit is not an integer"))?;
    let quota = Quota::try_from(limit).map_err(|e| malformed(&e.to_string()))?;

    Ok(Some((
        (*username).to_owned(),
        Credential {
            password: PasswordHash::from_stored(password),
            quota,
        },
    )))
}

pub(crate) fn format_line(username: &str, credential: &Credential) -> String {
    format!(
        "{username}:{}:{}\n",
        credential.password.to_stored(),
        credential.quota.as_limit()
    )
}

pub(crate) fn validate_username(username: &str) -> Result<(), StoreError> {
    let valid = !username.is_empty()
        && username.trim() == username
        && !username.contains([':', '\n', '\r']);

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidUsername(username.to_owned()))
    }
}
