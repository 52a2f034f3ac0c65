// Application state for HTTP handlers
use crate::application::binding::DataViewBinding;
use crate::application::data_view::DataView;
use crate::application::memory_view::MemoryDataView;
use crate::presentation::error::ApiError;
use crate::presentation::notices::NoticeBoard;
use std::sync::Arc;

pub struct AppState {
    view: Arc<MemoryDataView>,
    binding: DataViewBinding,
    notices: Arc<NoticeBoard>,
}

impl AppState {
    pub fn new(view: Arc<MemoryDataView>) -> Self {
        let notices = Arc::new(NoticeBoard::new());
        let binding = DataViewBinding::new(notices.subscriptions());
        binding.set_data_view(Some(view.clone() as Arc<dyn DataView>));
        Self {
            view,
            binding,
            notices,
        }
    }

    /// View that reads go through
    pub fn bound_view(&self) -> Result<Arc<dyn DataView>, ApiError> {
        self.binding.data_view().ok_or(ApiError::Unbound)
    }

    /// Backend that selection changes go to, available only while it is the bound view
    pub fn backend(&self) -> Result<&MemoryDataView, ApiError> {
        match self.binding.data_view() {
            Some(bound) if std::ptr::addr_eq(Arc::as_ptr(&bound), Arc::as_ptr(&self.view)) => {
                Ok(&self.view)
            }
            _ => Err(ApiError::Unbound),
        }
    }

    /// Stop serving the view, e.g. while the backend is being replaced
    pub fn detach(&self) {
        self.binding.detach();
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }
}
