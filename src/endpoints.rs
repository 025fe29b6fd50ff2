//! The endpoint catalog: one descriptor per API resource, pure data.
//!
//! Capability flags replace per-resource subclasses; the generic
//! engine in [`crate::endpoint`] consumes these unchanged.

use crate::endpoint::EndpointDescriptor;

const ONE_MINUTE: u64 = 60;
const ONE_DAY: u64 = 24 * 60 * 60;

pub fn account() -> EndpointDescriptor {
  EndpointDescriptor {
    path: "/v2/account",
    is_authenticated: true,
    ..EndpointDescriptor::default()
  }
}

pub fn achievements() -> EndpointDescriptor {
  EndpointDescriptor {
    path: "/v2/achievements",
    is_paginated: true,
    is_bulk: true,
    is_localized: true,
    cache_time: Some(ONE_DAY),
    ..EndpointDescriptor::default()
  }
}

pub fn build() -> EndpointDescriptor {
  EndpointDescriptor {
    path: "/v2/build",
    cache_time: Some(ONE_MINUTE),
    ..EndpointDescriptor::default()
  }
}

pub fn currencies() -> EndpointDescriptor {
  EndpointDescriptor {
    path: "/v2/currencies",
    is_paginated: true,
    is_bulk: true,
    is_localized: true,
    cache_time: Some(ONE_DAY),
    ..EndpointDescriptor::default()
  }
}

pub fn files() -> EndpointDescriptor {
  EndpointDescriptor {
    path: "/v2/files",
    is_paginated: true,
    is_bulk: true,
    cache_time: Some(ONE_DAY),
    ..EndpointDescriptor::default()
  }
}

pub fn gliders() -> EndpointDescriptor {
  EndpointDescriptor {
    path: "/v2/gliders",
    is_paginated: true,
    is_bulk: true,
    is_localized: true,
    cache_time: Some(ONE_DAY),
    ..EndpointDescriptor::default()
  }
}

pub fn items() -> EndpointDescriptor {
  EndpointDescriptor {
    path: "/v2/items",
    is_paginated: true,
    is_bulk: true,
    is_localized: true,
    cache_time: Some(ONE_DAY),
    ..EndpointDescriptor::default()
  }
}

// No cache time: itemstats data is always resolved live.
pub fn itemstats() -> EndpointDescriptor {
  EndpointDescriptor {
    path: "/v2/itemstats",
    is_paginated: true,
    is_bulk: true,
    is_localized: true,
    ..EndpointDescriptor::default()
  }
}

pub fn maps() -> EndpointDescriptor {
  EndpointDescriptor {
    path: "/v2/maps",
    is_paginated: true,
    is_bulk: true,
    is_localized: true,
    cache_time: Some(ONE_DAY),
    ..EndpointDescriptor::default()
  }
}

pub fn materials() -> EndpointDescriptor {
  EndpointDescriptor {
    path: "/v2/materials",
    is_bulk: true,
    is_localized: true,
    ..EndpointDescriptor::default()
  }
}

pub fn quaggans() -> EndpointDescriptor {
  EndpointDescriptor {
    path: "/v2/quaggans",
    is_paginated: true,
    is_bulk: true,
    cache_time: Some(ONE_DAY),
    ..EndpointDescriptor::default()
  }
}

pub fn specializations() -> EndpointDescriptor {
  EndpointDescriptor {
    path: "/v2/specializations",
    is_paginated: true,
    is_bulk: true,
    is_localized: true,
    cache_time: Some(ONE_DAY),
    ..EndpointDescriptor::default()
  }
}

pub fn titles() -> EndpointDescriptor {
  EndpointDescriptor {
    path: "/v2/titles",
    is_paginated: true,
    is_bulk: true,
    is_localized: true,
    cache_time: Some(ONE_DAY),
    ..EndpointDescriptor::default()
  }
}

pub fn tokeninfo() -> EndpointDescriptor {
  EndpointDescriptor {
    path: "/v2/tokeninfo",
    is_authenticated: true,
    ..EndpointDescriptor::default()
  }
}

pub fn worlds() -> EndpointDescriptor {
  EndpointDescriptor {
    path: "/v2/worlds",
    is_paginated: true,
    is_bulk: true,
    is_localized: true,
    cache_time: Some(ONE_DAY),
    ..EndpointDescriptor::default()
  }
}
