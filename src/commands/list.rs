//! List commands implementation

use fpgalink_host::available_backends;

/// List all backends compiled into this binary
pub fn list_backends() {
    let backends = available_backends();
    if backends.is_empty() {
        println!("No backends available (recompile with features)");
        return;
    }

    println!("Available backends:");
    println!();
    for backend in &backends {
        println!("  {:<12} - {}", backend.name, backend.description);
        if !backend.aliases.is_empty() {
            println!("  {:<12}   aliases: {}", "", backend.aliases.join(", "));
        }
    }
}
