use anyhow::Context;
use ethers::signers::{coins_bip39::English, LocalWallet, MnemonicBuilder};
use std::{fs, path::Path};

/// Given a seed phrase, build a wallet
///
/// # Arguments
/// * `seed` - The seed phrase
///
/// # Returns
/// * `Wallet<SigningKey>` - The wallet
pub fn build_wallet(seed: &str) -> anyhow::Result<LocalWallet> {
    let wallet = MnemonicBuilder::<English>::default().phrase(seed).build()?;
    Ok(wallet)
}

/// Builds a wallet from a file holding either a hex private key or a mnemonic phrase
pub fn wallet_from_file(path: &Path) -> anyhow::Result<LocalWallet> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("cannot read key file {}", path.display()))?;
    let secret = content.trim();
    if is_private_key(secret) {
        return secret
            .parse::<LocalWallet>()
            .with_context(|| format!("invalid private key in {}", path.display()));
    }
    build_wallet(secret).with_context(|| format!("invalid mnemonic in {}", path.display()))
}

fn is_private_key(secret: &str) -> bool {
    let hex = secret.strip_prefix("0x").unwrap_or(secret);
    hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

/// Current unix time in milliseconds, the default account index so each run gets a fresh account
pub fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::signers::Signer;
    use std::io::Write;
    use tempdir::TempDir;

    const SEED_PHRASE: &str = "test test test test test test test test test test test junk";

    fn write_key_file(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("funder");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "{content}").unwrap();
        path
    }

    #[test]
    fn reads_private_key_file() {
        let dir = TempDir::new("funder_key").unwrap();
        let path = write_key_file(
            &dir,
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        );
        let wallet = wallet_from_file(&path).unwrap();
        assert_eq!(
            wallet.address(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap()
        );
    }

    #[test]
    fn reads_mnemonic_file() {
        let dir = TempDir::new("funder_mnemonic").unwrap();
        let path = write_key_file(&dir, SEED_PHRASE);
        let wallet = wallet_from_file(&path).unwrap();
        assert_eq!(wallet.address(), build_wallet(SEED_PHRASE).unwrap().address());
        assert_eq!(
            wallet.address(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap()
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = TempDir::new("funder_missing").unwrap();
        assert!(wallet_from_file(&dir.path().join("nope")).is_err());
    }
}
