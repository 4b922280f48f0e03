#[allow(unused_imports)]
use std::env;
use std::path::PathBuf;

// These helper functions are only used when kinesis-sdk feature is enabled
#[allow(dead_code)]
/// Print a boxed error message for visibility in cargo output
fn print_env_error(title: &str, details: &[&str], fixes: &[&str]) {
    eprintln!();
    eprintln!("╔══════════════════════════════════════════════════════════════════╗");
    eprintln!("║ KINESIS BUILD ERROR: {:<44} ║", title);
    eprintln!("╠══════════════════════════════════════════════════════════════════╣");
    for detail in details {
        eprintln!("║ {:<66} ║", detail);
    }
    eprintln!("╠══════════════════════════════════════════════════════════════════╣");
    eprintln!("║ HOW TO FIX:                                                      ║");
    for fix in fixes {
        eprintln!("║   {:<64} ║", fix);
    }
    eprintln!("╚══════════════════════════════════════════════════════════════════╝");
    eprintln!();
}

#[allow(dead_code)]
/// Check for common Kinesis installation paths
fn find_kinesis_sdk() -> Option<PathBuf> {
    let candidates = [
        r"C:\Program Files\Thorlabs\Kinesis",
        r"C:\Program Files (x86)\Thorlabs\Kinesis",
    ];

    candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| p.join("Thorlabs.MotionControl.FilterFlipper.lib").exists())
}

fn main() {
    // Only emit linking logic if the `kinesis-sdk` feature is enabled.
    // This allows the crate to compile without the SDK if the feature is not active.
    #[cfg(feature = "kinesis-sdk")]
    {
        println!("cargo:rerun-if-env-changed=KINESIS_SDK_DIR");

        let sdk_dir = match env::var("KINESIS_SDK_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => {
                if let Some(found) = find_kinesis_sdk() {
                    println!(
                        "cargo:warning=KINESIS_SDK_DIR not set, auto-detected: {}",
                        found.display()
                    );
                    found
                } else {
                    print_env_error(
                        "KINESIS_SDK_DIR not set",
                        &[
                            "The kinesis-sdk feature requires the Thorlabs Kinesis SDK.",
                            "The import libraries could not be found automatically.",
                        ],
                        &[r#"set KINESIS_SDK_DIR=C:\Program Files\Thorlabs\Kinesis"#],
                    );
                    panic!("KINESIS_SDK_DIR must be set when `kinesis-sdk` feature is enabled.");
                }
            }
        };

        if !sdk_dir.exists() {
            println!(
                "cargo:warning=Kinesis SDK path does not exist: {}",
                sdk_dir.display()
            );
            println!("cargo:warning=Linker will search standard paths");
        }

        println!("cargo:rustc-link-search=native={}", sdk_dir.display());
        println!("cargo:rustc-link-lib=dylib=Thorlabs.MotionControl.DeviceManager");
        println!("cargo:rustc-link-lib=dylib=Thorlabs.MotionControl.FilterFlipper");
    }
}
