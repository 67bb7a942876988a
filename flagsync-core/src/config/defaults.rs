//! Default configuration values
//!
//! These are embedded in the binary and used when no config file exists.

/// Default configuration as TOML
pub const DEFAULT_CONFIG_TOML: &str = r##"
# flagsync configuration

[sync]
# SDK key for environments that do not set their own
credential = "<YOUR-SDK-KEY>"
# development | staging | production (FLAGSYNC_ENV takes precedence)
# environment = "production"
fetch_interval_secs = 60
verbosity = "default"
# static: register declared flags before setup; dynamic: look up by name only
access_mode = "static"

# Self-managed deployments only
[sync.endpoints]
# configuration = "https://conf.example.com"
# state = "https://state.example.com"
# analytics = "https://analytics.example.com"
# notifications = "https://push.example.com"

[environments.development]
# credential = "<YOUR-DEVELOPMENT-SDK-KEY>"
[environments.development.overrides]
"features.enableAdvancedFilters" = true
"features.enableCollaboration" = true

[environments.staging]
# credential = "<YOUR-STAGING-SDK-KEY>"
[environments.staging.overrides]
"features.enableAdvancedFilters" = true
"features.maxExportRows" = 5000

[environments.production]
# credential = "<YOUR-PRODUCTION-SDK-KEY>"

[provider]
# flags_file = "~/.config/flagsync/flags.toml"

[[flags]]
namespace = "namespace"
name = "namespacedFlag"
default = false

[[flags]]
namespace = "routes"
name = "home"
default = true

[[flags]]
namespace = "default"
name = "showMessage"
default = false
description = "Should the message be shown?"

[[flags]]
namespace = "default"
name = "message"
default = "This is the default message; try changing some flag values!"

[[flags]]
namespace = "default"
name = "fontColor"
default = "White"
options = ["Red", "Green", "Blue", "Black"]

[[flags]]
namespace = "default"
name = "fontSize"
default = 24
options = [12, 16, 24]

[[flags]]
namespace = "features"
name = "enableSearch"
default = true

[[flags]]
namespace = "features"
name = "enableAdvancedFilters"
default = false

[[flags]]
namespace = "features"
name = "enableExport"
default = true

[[flags]]
namespace = "features"
name = "maxExportRows"
default = 1000
options = [100, 1000, 5000, 10000]

[[flags]]
namespace = "features"
name = "enableCollaboration"
default = false

# A child flag is only effective while its parent is enabled
[[flags]]
namespace = "notifications"
name = "enableNotifications"
default = true
description = "Master switch for every notification channel"

[[flags]]
namespace = "notifications"
name = "emailNotifications"
default = true
parent = "enableNotifications"

[[flags]]
namespace = "notifications"
name = "pushNotifications"
default = false
parent = "enableNotifications"

[[flags]]
namespace = "notifications"
name = "smsNotifications"
default = false
parent = "enableNotifications"

[[flags]]
namespace = "notifications"
name = "notificationFrequency"
default = "immediate"
options = ["immediate", "hourly", "daily", "weekly"]
description = "Applies to every enabled channel"

[[flags]]
name = "frozenFlag"
default = false
freeze = "until_launch"
description = "Holds its first value until explicitly unfrozen"
"##;
